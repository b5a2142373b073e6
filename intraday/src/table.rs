use crate::{
    config::{PipelineConfigs, SystemConfig},
    error::{ConfigError, IntradayError, SnapshotError},
    pipeline::{Pipeline, PipelineOutput},
    snapshot::SystemSnapshot,
};
use fnv::FnvHashMap;
use intraday_alert::{AlertSink, DispatchReport};
use intraday_instrument::{InstrumentId, PriceBar};
use itertools::Itertools;
use std::collections::hash_map::Entry;

/// Synchronous instrument-keyed [`Pipeline`] table for deterministic replay without an async
/// runtime. Pipelines are created on the first bar of each instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineTable {
    configs: PipelineConfigs,
    pipelines: FnvHashMap<InstrumentId, Pipeline>,
}

impl PipelineTable {
    pub fn new(config: &SystemConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            configs: PipelineConfigs::from(config),
            pipelines: FnvHashMap::default(),
        })
    }

    /// Restore every [`Pipeline`] of a [`SystemSnapshot`].
    pub fn restore(config: &SystemConfig, snapshot: SystemSnapshot) -> Result<Self, SnapshotError> {
        let mut table = Self::new(config)?;
        for pipeline in snapshot.pipelines {
            let instrument = pipeline.instrument.clone();
            let pipeline = Pipeline::restore(table.configs.get(&instrument), pipeline)?;
            table.pipelines.insert(instrument, pipeline);
        }
        Ok(table)
    }

    /// Route a bar to the [`Pipeline`] of its instrument.
    pub fn process<Sink>(
        &mut self,
        bar: &PriceBar,
        sink: &Sink,
    ) -> Result<PipelineOutput, IntradayError>
    where
        Sink: AlertSink + ?Sized,
    {
        let pipeline = match self.pipelines.entry(bar.instrument.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(Pipeline::new(
                bar.instrument.clone(),
                self.configs.get(&bar.instrument),
            )?),
        };

        pipeline.process(bar, sink).map_err(IntradayError::from)
    }

    /// Close the session of every instrument, ordered by [`InstrumentId`].
    pub fn session_close_all<Sink>(&mut self, sink: &Sink) -> Vec<(InstrumentId, DispatchReport)>
    where
        Sink: AlertSink + ?Sized,
    {
        self.pipelines
            .iter_mut()
            .sorted_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(instrument, pipeline)| (instrument.clone(), pipeline.session_close(sink)))
            .collect()
    }

    pub fn get(&self, instrument: &InstrumentId) -> Option<&Pipeline> {
        self.pipelines.get(instrument)
    }

    pub fn instruments(&self) -> impl Iterator<Item = &InstrumentId> {
        self.pipelines.keys()
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    pub fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot::new(self.pipelines.values().map(Pipeline::snapshot))
    }
}

use crate::{decision::DecisionState, error::SnapshotError, normalizer::BarNormalizer};
use intraday_alert::{AlertDispatcher, rule::RuleEvaluator};
use intraday_instrument::InstrumentId;
use intraday_ta::{IndicatorEngine, PatternDetector};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::Path;

/// Serialisable state of one instrument [`Pipeline`](crate::pipeline::Pipeline): indicator
/// accumulators, automaton states, cool-downs, alert windows and the latest decision.
///
/// Restoring a snapshot and replaying the subsequent bars reproduces the state of uninterrupted
/// processing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PipelineSnapshot {
    pub instrument: InstrumentId,
    pub normalizer: BarNormalizer,
    pub engine: IndicatorEngine,
    pub detector: PatternDetector,
    pub rules: RuleEvaluator,
    pub dispatcher: AlertDispatcher,
    pub decision: DecisionState,
}

/// [`PipelineSnapshot`] of every instrument, ordered by [`InstrumentId`].
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct SystemSnapshot {
    pub pipelines: Vec<PipelineSnapshot>,
}

impl SystemSnapshot {
    pub fn new<Iter>(pipelines: Iter) -> Self
    where
        Iter: IntoIterator<Item = PipelineSnapshot>,
    {
        let mut pipelines = pipelines.into_iter().collect::<Vec<_>>();
        pipelines.sort_by(|a, b| a.instrument.cmp(&b.instrument));
        Self { pipelines }
    }

    pub fn get(&self, instrument: &InstrumentId) -> Option<&PipelineSnapshot> {
        self.pipelines
            .binary_search_by(|snapshot| snapshot.instrument.cmp(instrument))
            .ok()
            .map(|index| &self.pipelines[index])
    }
}

/// JSON persistence of snapshots.
pub trait JsonSnapshot: Serialize + DeserializeOwned {
    fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(self).map_err(SnapshotError::from)
    }

    fn from_json(json: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(json).map_err(SnapshotError::from)
    }

    fn write_to<P>(&self, path: P) -> Result<(), SnapshotError>
    where
        P: AsRef<Path>,
    {
        std::fs::write(path, self.to_json()?).map_err(SnapshotError::from)
    }

    fn read_from<P>(path: P) -> Result<Self, SnapshotError>
    where
        P: AsRef<Path>,
    {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

impl JsonSnapshot for PipelineSnapshot {}
impl JsonSnapshot for SystemSnapshot {}

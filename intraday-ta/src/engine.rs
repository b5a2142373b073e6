use crate::{
    error::{IndicatorError, OutOfOrderError, TaConfigError},
    indicator::{
        AnyIndicator, Indicator, IndicatorName, IndicatorReading, IndicatorSpec, IndicatorValue,
        OVERFLOW,
    },
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use intraday_instrument::{InstrumentId, PriceBar};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Default number of recent [`IndicatorVector`]s retained for queries.
pub const DEFAULT_HISTORY_CAPACITY: usize = 500;

/// Indicator values of every configured indicator for one accepted bar.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IndicatorVector {
    pub instrument: InstrumentId,
    pub time: DateTime<Utc>,
    /// Zero-based index of the accepted bar within the instrument stream.
    pub bar_index: u64,
    pub close: f64,
    /// Readings keyed by indicator name, in configuration order.
    pub values: IndexMap<IndicatorName, IndicatorReading>,
}

impl IndicatorVector {
    pub fn reading(&self, name: &str) -> Option<&IndicatorReading> {
        self.values.get(name)
    }

    pub fn value(&self, name: &str) -> Option<IndicatorValue> {
        self.values.get(name).map(|reading| reading.value)
    }
}

/// Per-instrument owner of the configured indicators.
///
/// Emits exactly one [`IndicatorVector`] per accepted bar, so every indicator series is aligned
/// 1:1 with the accepted bar stream.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IndicatorEngine {
    instrument: InstrumentId,
    indicators: IndexMap<IndicatorName, AnyIndicator>,
    last_time: Option<DateTime<Utc>>,
    bars_accepted: u64,
    history: VecDeque<IndicatorVector>,
    history_capacity: usize,
}

impl IndicatorEngine {
    /// Construct a new engine, validating every [`IndicatorSpec`].
    pub fn new(
        instrument: InstrumentId,
        specs: &[IndicatorSpec],
        history_capacity: usize,
    ) -> Result<Self, TaConfigError> {
        if history_capacity == 0 {
            return Err(TaConfigError::ZeroHistoryCapacity);
        }

        let mut indicators = IndexMap::with_capacity(specs.len());
        for spec in specs {
            spec.validate()?;
            if indicators.contains_key(&spec.name) {
                return Err(TaConfigError::DuplicateIndicator(spec.name.clone()));
            }
            indicators.insert(spec.name.clone(), AnyIndicator::new(&spec.kind));
        }

        Ok(Self {
            instrument,
            indicators,
            last_time: None,
            bars_accepted: 0,
            history: VecDeque::with_capacity(history_capacity.min(DEFAULT_HISTORY_CAPACITY)),
            history_capacity,
        })
    }

    /// Ingest the next bar.
    ///
    /// Bars whose timestamp is not strictly greater than the last accepted bar are rejected with
    /// [`IndicatorError::OutOfOrder`] and leave the engine untouched. A bar with non-finite fields
    /// is accepted for alignment, but every indicator reports `ComputationOverflow` for it and no
    /// accumulator changes.
    pub fn ingest(&mut self, bar: &PriceBar) -> Result<IndicatorVector, IndicatorError> {
        if bar.instrument != self.instrument {
            return Err(IndicatorError::InstrumentMismatch {
                expected: self.instrument.clone(),
                received: bar.instrument.clone(),
            });
        }

        if let Some(last_accepted) = self.last_time {
            if bar.time <= last_accepted {
                return Err(IndicatorError::from(OutOfOrderError {
                    instrument: self.instrument.clone(),
                    last_accepted,
                    received: bar.time,
                }));
            }
        }

        let finite = bar.is_finite();
        if !finite {
            warn!(
                instrument = %self.instrument,
                time = %bar.time,
                "IndicatorEngine received non-finite bar, reporting ComputationOverflow"
            );
        }

        let values = self
            .indicators
            .iter_mut()
            .map(|(name, indicator)| {
                let value = if finite { indicator.update(bar) } else { OVERFLOW };
                let reading = IndicatorReading {
                    kind: indicator.indicator_type(),
                    value,
                };
                (name.clone(), reading)
            })
            .collect();

        let vector = IndicatorVector {
            instrument: self.instrument.clone(),
            time: bar.time,
            bar_index: self.bars_accepted,
            close: bar.close,
            values,
        };

        self.bars_accepted += 1;
        self.last_time = Some(bar.time);

        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(vector.clone());

        debug!(
            instrument = %self.instrument,
            bar_index = vector.bar_index,
            "IndicatorEngine updated"
        );

        Ok(vector)
    }

    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    /// Timestamp of the last accepted bar.
    pub fn last_time(&self) -> Option<DateTime<Utc>> {
        self.last_time
    }

    pub fn bars_accepted(&self) -> u64 {
        self.bars_accepted
    }

    /// Latest [`IndicatorVector`], if any bar has been accepted.
    pub fn latest(&self) -> Option<&IndicatorVector> {
        self.history.back()
    }

    /// Bounded recent history of [`IndicatorVector`]s, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &IndicatorVector> {
        self.history.iter()
    }

    /// Recent series of one indicator as `(bar_index, value)` pairs, oldest first.
    pub fn series<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = (u64, IndicatorValue)> + 'a {
        self.history
            .iter()
            .filter_map(move |vector| Some((vector.bar_index, vector.value(name)?)))
    }

    /// Configured indicator names, in configuration order.
    pub fn names(&self) -> impl Iterator<Item = &IndicatorName> {
        self.indicators.keys()
    }

    /// Warm-up of the named indicator.
    pub fn warm_up(&self, name: &str) -> Option<usize> {
        self.indicators.get(name).map(Indicator::warm_up)
    }
}

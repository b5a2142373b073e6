use crate::error::{ConfigError, DataGapError, PipelineError};
use chrono::{DateTime, Utc};
use intraday_instrument::{InstrumentId, PriceBar};
use intraday_ta::error::OutOfOrderError;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Default upper bound on the absolute value of any bar field.
pub const DEFAULT_MAX_ABS_VALUE: f64 = 1e12;

/// [`BarNormalizer`] configuration.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Expected spacing of consecutive bars. Gap detection is disabled when `None`.
    pub expected_interval_secs: Option<u64>,
    /// Missing bars tolerated before a [`DataGapError`] is reported.
    pub gap_tolerance: u64,
    /// Bars with any field whose absolute value exceeds this are malformed.
    pub max_abs_value: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            expected_interval_secs: None,
            gap_tolerance: 0,
            max_abs_value: DEFAULT_MAX_ABS_VALUE,
        }
    }
}

impl NormalizerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.expected_interval_secs == Some(0) {
            return Err(ConfigError::Normalizer(
                "expected_interval_secs must be > 0".to_string(),
            ));
        }
        if !(self.max_abs_value.is_finite() && self.max_abs_value > 0.0) {
            return Err(ConfigError::Normalizer(format!(
                "max_abs_value {} must be finite and > 0",
                self.max_abs_value
            )));
        }
        Ok(())
    }
}

/// Bar accepted by the [`BarNormalizer`], annotated with gap and session markers.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NormalizedBar {
    pub bar: PriceBar,
    /// Bars missing since the previous accepted bar, beyond the configured tolerance.
    pub gap: Option<DataGapError>,
    /// First bar of a new trading session (UTC calendar day change).
    pub session_boundary: bool,
}

/// Validates raw bars before they reach any stateful component.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BarNormalizer {
    instrument: InstrumentId,
    config: NormalizerConfig,
    last_time: Option<DateTime<Utc>>,
}

impl BarNormalizer {
    pub fn new(instrument: InstrumentId, config: NormalizerConfig) -> Self {
        Self {
            instrument,
            config,
            last_time: None,
        }
    }

    pub fn last_time(&self) -> Option<DateTime<Utc>> {
        self.last_time
    }

    /// Validate and accept the next bar.
    ///
    /// Rejected bars leave the normalizer untouched.
    pub fn normalize(&mut self, bar: &PriceBar) -> Result<NormalizedBar, PipelineError> {
        if bar.instrument != self.instrument {
            return Err(PipelineError::InstrumentMismatch {
                expected: self.instrument.clone(),
                received: bar.instrument.clone(),
            });
        }

        if let Some(reason) = self.malformed(bar) {
            warn!(
                instrument = %self.instrument,
                time = %bar.time,
                %reason,
                "BarNormalizer rejected malformed bar"
            );
            return Err(PipelineError::MalformedBar {
                instrument: self.instrument.clone(),
                time: bar.time,
                reason,
            });
        }

        let (gap, session_boundary) = match self.last_time {
            Some(last_accepted) if bar.time <= last_accepted => {
                warn!(
                    instrument = %self.instrument,
                    %last_accepted,
                    received = %bar.time,
                    "BarNormalizer rejected out of order bar"
                );
                return Err(PipelineError::OutOfOrder(OutOfOrderError {
                    instrument: self.instrument.clone(),
                    last_accepted,
                    received: bar.time,
                }));
            }
            Some(previous) if previous.date_naive() != bar.time.date_naive() => {
                info!(
                    instrument = %self.instrument,
                    %previous,
                    received = %bar.time,
                    "BarNormalizer detected session boundary"
                );
                (None, true)
            }
            Some(previous) => (self.gap(previous, bar.time), false),
            None => (None, false),
        };

        if let Some(gap) = &gap {
            warn!(
                instrument = %self.instrument,
                missing_bars = gap.missing_bars,
                "BarNormalizer detected data gap"
            );
        }

        self.last_time = Some(bar.time);

        Ok(NormalizedBar {
            bar: bar.clone(),
            gap,
            session_boundary,
        })
    }

    fn malformed(&self, bar: &PriceBar) -> Option<String> {
        if !bar.is_finite() {
            return Some("non-finite field".to_string());
        }

        let fields = [bar.open, bar.high, bar.low, bar.close, bar.volume];
        if fields
            .iter()
            .any(|value| value.abs() > self.config.max_abs_value)
        {
            return Some(format!(
                "field exceeds maximum absolute value {}",
                self.config.max_abs_value
            ));
        }

        if bar.volume < 0.0 {
            Some(format!("negative volume {}", bar.volume))
        } else if bar.low > bar.high {
            Some(format!("low {} > high {}", bar.low, bar.high))
        } else if bar.high < bar.open.max(bar.close) {
            Some(format!("high {} below body", bar.high))
        } else if bar.low > bar.open.min(bar.close) {
            Some(format!("low {} above body", bar.low))
        } else {
            None
        }
    }

    fn gap(&self, previous: DateTime<Utc>, received: DateTime<Utc>) -> Option<DataGapError> {
        let interval = self.config.expected_interval_secs?;
        let elapsed = u64::try_from((received - previous).num_seconds()).ok()?;

        let missing_bars = (elapsed / interval).saturating_sub(1);
        (missing_bars > self.config.gap_tolerance).then(|| DataGapError {
            instrument: self.instrument.clone(),
            previous,
            received,
            missing_bars,
        })
    }
}

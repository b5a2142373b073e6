use crate::{alert::AlertSeverity, error::AlertConfigError, rule::IndicatorRule};
use intraday_ta::IndicatorSpec;
use serde::{Deserialize, Serialize};

/// Longest accepted suppression window (one week).
pub const MAX_SUPPRESSION_WINDOW_SECS: u64 = 7 * 24 * 60 * 60;

/// Alert dispatcher configuration.
///
/// Pattern signals alert once their confidence reaches `min_confidence`. Severity escalates to
/// [`AlertSeverity::Warning`] and [`AlertSeverity::Critical`] at the respective thresholds.
///
/// ```json
/// {
///   "suppression_window_secs": 900,
///   "queue_capacity": 64,
///   "min_confidence": 0.6,
///   "rules": [
///     { "indicator": "rsi_14", "crossing": "above", "level": 70.0 }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertConfig {
    pub suppression_window_secs: u64,
    pub queue_capacity: usize,
    pub min_confidence: f64,
    pub warning_confidence: f64,
    pub critical_confidence: f64,
    pub rules: Vec<IndicatorRule>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            suppression_window_secs: 15 * 60,
            queue_capacity: 64,
            min_confidence: 0.6,
            warning_confidence: 0.75,
            critical_confidence: 0.9,
            rules: Vec::new(),
        }
    }
}

impl AlertConfig {
    /// Validate the configuration against the configured indicators.
    pub fn validate(&self, indicators: &[IndicatorSpec]) -> Result<(), AlertConfigError> {
        if self.queue_capacity == 0 {
            return Err(AlertConfigError::ZeroQueueCapacity);
        }

        if self.suppression_window_secs > MAX_SUPPRESSION_WINDOW_SECS {
            return Err(AlertConfigError::SuppressionWindowTooLong {
                secs: self.suppression_window_secs,
                max: MAX_SUPPRESSION_WINDOW_SECS,
            });
        }

        let thresholds = [
            self.min_confidence,
            self.warning_confidence,
            self.critical_confidence,
        ];
        if thresholds
            .iter()
            .any(|threshold| !(0.0..=1.0).contains(threshold))
        {
            return Err(AlertConfigError::InvalidThresholds(format!(
                "confidence thresholds {thresholds:?} must be within [0, 1]"
            )));
        }
        if !(self.min_confidence <= self.warning_confidence
            && self.warning_confidence <= self.critical_confidence)
        {
            return Err(AlertConfigError::InvalidThresholds(format!(
                "expected min <= warning <= critical, found {thresholds:?}"
            )));
        }

        self.rules
            .iter()
            .try_for_each(|rule| rule.validate(indicators))
    }

    /// Severity of a pattern signal with the provided confidence, `None` below `min_confidence`.
    pub fn pattern_severity(&self, confidence: f64) -> Option<AlertSeverity> {
        if confidence >= self.critical_confidence {
            Some(AlertSeverity::Critical)
        } else if confidence >= self.warning_confidence {
            Some(AlertSeverity::Warning)
        } else if confidence >= self.min_confidence {
            Some(AlertSeverity::Info)
        } else {
            None
        }
    }
}

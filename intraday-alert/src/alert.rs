use chrono::{DateTime, Utc};
use derive_more::{Display, From};
use intraday_instrument::InstrumentId;
use intraday_ta::{IndicatorName, PatternSignal, PatternType, signal::Cross};
use serde::{Deserialize, Serialize};

/// Identifier of an [`Alert`], unique per dispatcher.
///
/// Consumers deduplicating an at-least-once alert stream should key by
/// `(instrument, AlertId)`.
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Default,
    Deserialize,
    Serialize,
    Display,
    From,
)]
pub struct AlertId(pub u64);

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Default,
    Deserialize,
    Serialize,
    Display,
)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    #[default]
    Info,
    Warning,
    Critical,
}

/// Origin of an alert. Together with the instrument it forms the deduplication key.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum AlertSource {
    #[display("{indicator} crossing {crossing}")]
    Indicator {
        indicator: IndicatorName,
        crossing: Cross,
    },
    #[display("{pattern}")]
    Pattern { pattern: PatternType },
}

/// Lifecycle of an [`Alert`]: `Pending -> Dispatched -> Suppressed`.
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Default,
    Deserialize,
    Serialize,
    Display,
)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    /// Queued, awaiting delivery.
    #[default]
    Pending,
    /// Delivered to the sink.
    Dispatched,
    /// Delivered, and further repeats inside the suppression window were folded into it.
    Suppressed,
}

/// Alert record. Mutated only by the [`AlertDispatcher`](crate::dispatcher::AlertDispatcher).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Alert {
    pub id: AlertId,
    pub instrument: InstrumentId,
    pub severity: AlertSeverity,
    pub source: AlertSource,
    pub message: String,
    pub created_at: DateTime<Utc>,
    /// End of the suppression window (exclusive).
    pub suppressed_until: DateTime<Utc>,
    pub state: AlertState,
    /// Number of repeat requests folded into this alert.
    pub folded: u32,
}

/// Qualifying signal submitted to the dispatcher.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AlertRequest {
    pub instrument: InstrumentId,
    pub severity: AlertSeverity,
    pub source: AlertSource,
    pub message: String,
    pub time: DateTime<Utc>,
}

impl AlertRequest {
    pub fn from_pattern(signal: &PatternSignal, severity: AlertSeverity) -> Self {
        Self {
            instrument: signal.instrument.clone(),
            severity,
            source: AlertSource::Pattern {
                pattern: signal.pattern_type,
            },
            message: format!(
                "{} {} over bars {}..={} (confidence {:.2})",
                signal.instrument,
                signal.pattern_type,
                signal.start_bar,
                signal.end_bar,
                signal.confidence
            ),
            time: signal.detected_at,
        }
    }
}

impl From<&Alert> for AlertRequest {
    fn from(alert: &Alert) -> Self {
        Self {
            instrument: alert.instrument.clone(),
            severity: alert.severity,
            source: alert.source.clone(),
            message: alert.message.clone(),
            time: alert.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intraday_instrument::test_utils::session_open;

    #[test]
    fn test_severity_ordering() {
        assert!(AlertSeverity::Info < AlertSeverity::Warning);
        assert!(AlertSeverity::Warning < AlertSeverity::Critical);
    }

    #[test]
    fn test_request_from_pattern() {
        let signal = PatternSignal {
            instrument: InstrumentId::new("TCS.NS"),
            pattern_type: PatternType::DoubleTop,
            start_bar: 5,
            end_bar: 11,
            confidence: 0.8,
            detected_at: session_open(),
            valid_until_bar: 21,
        };

        let request = AlertRequest::from_pattern(&signal, AlertSeverity::Warning);
        assert_eq!(
            request.source,
            AlertSource::Pattern {
                pattern: PatternType::DoubleTop
            }
        );
        assert_eq!(request.time, signal.detected_at);
        assert_eq!(
            request.message,
            "TCS.NS DoubleTop over bars 5..=11 (confidence 0.80)"
        );
    }

    #[test]
    fn test_source_de() {
        let input = r#"{"source": "indicator", "indicator": "rsi_14", "crossing": "above"}"#;
        let source: AlertSource = serde_json::from_str(input).unwrap();
        assert_eq!(
            source,
            AlertSource::Indicator {
                indicator: IndicatorName::new("rsi_14"),
                crossing: Cross::Above,
            }
        );
    }
}

use crate::alert::{AlertId, AlertSeverity};
use intraday_instrument::InstrumentId;
use intraday_ta::IndicatorName;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Alert that could not reach the delivery collaborator.
///
/// Surfaced to the caller of the [`AlertDispatcher`](crate::dispatcher::AlertDispatcher), never
/// fatal to the instrument pipeline.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Error)]
pub enum AlertDeliveryError {
    #[error("alert queue full (capacity {capacity}), dropped {severity} alert {dropped} for {instrument}")]
    QueueFull {
        dropped: AlertId,
        instrument: InstrumentId,
        severity: AlertSeverity,
        capacity: usize,
    },

    #[error("failed to deliver alert {alert}: {reason}")]
    Delivery { alert: AlertId, reason: String },
}

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Error)]
pub enum AlertConfigError {
    #[error("alert queue capacity must be > 0")]
    ZeroQueueCapacity,

    #[error("suppression window {secs}s exceeds maximum {max}s")]
    SuppressionWindowTooLong { secs: u64, max: u64 },

    #[error("invalid confidence thresholds: {0}")]
    InvalidThresholds(String),

    #[error("rule on indicator {indicator}: {reason}")]
    InvalidRule {
        indicator: IndicatorName,
        reason: String,
    },
}

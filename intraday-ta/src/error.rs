use crate::{indicator::IndicatorName, pattern::PatternType};
use chrono::{DateTime, Utc};
use intraday_instrument::InstrumentId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while ingesting a bar into an [`IndicatorEngine`](crate::engine::IndicatorEngine).
///
/// In every case the bar is dropped and engine state is left untouched.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Error)]
pub enum IndicatorError {
    #[error("{0}")]
    OutOfOrder(#[from] OutOfOrderError),

    #[error("bar for instrument {received} ingested by engine for {expected}")]
    InstrumentMismatch {
        expected: InstrumentId,
        received: InstrumentId,
    },
}

/// Bar timestamp was not strictly greater than the last accepted bar of the instrument.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Error)]
#[error("out of order bar for {instrument}: received {received} <= last accepted {last_accepted}")]
pub struct OutOfOrderError {
    pub instrument: InstrumentId,
    pub last_accepted: DateTime<Utc>,
    pub received: DateTime<Utc>,
}

/// Invalid indicator or pattern configuration. Fatal for pipeline instantiation only.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Error)]
pub enum TaConfigError {
    #[error("indicator {name}: {reason}")]
    InvalidIndicator { name: IndicatorName, reason: String },

    #[error("indicator {0} configured more than once")]
    DuplicateIndicator(IndicatorName),

    #[error("pattern {pattern}: {reason}")]
    InvalidPattern { pattern: PatternType, reason: String },

    #[error("pattern {pattern} references unknown MACD indicator {indicator}")]
    UnknownIndicator {
        pattern: PatternType,
        indicator: IndicatorName,
    },

    #[error("indicator history capacity must be > 0")]
    ZeroHistoryCapacity,
}

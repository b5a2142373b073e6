use chrono::{DateTime, Utc};
use intraday_alert::{AlertConfigError, AlertDeliveryError};
use intraday_instrument::InstrumentId;
use intraday_ta::error::{IndicatorError, OutOfOrderError, TaConfigError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error aggregating every Intraday error kind.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum IntradayError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("pipeline: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("system: {0}")]
    System(#[from] SystemError),
}

/// Bar rejected by an instrument pipeline. Pipeline state is untouched in every case.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum PipelineError {
    #[error("{0}")]
    OutOfOrder(#[from] OutOfOrderError),

    #[error("malformed bar for {instrument} at {time}: {reason}")]
    MalformedBar {
        instrument: InstrumentId,
        time: DateTime<Utc>,
        reason: String,
    },

    #[error("bar for instrument {received} routed to pipeline for {expected}")]
    InstrumentMismatch {
        expected: InstrumentId,
        received: InstrumentId,
    },
}

impl From<IndicatorError> for PipelineError {
    fn from(value: IndicatorError) -> Self {
        match value {
            IndicatorError::OutOfOrder(error) => Self::OutOfOrder(error),
            IndicatorError::InstrumentMismatch { expected, received } => {
                Self::InstrumentMismatch { expected, received }
            }
        }
    }
}

/// Missing bars detected between two consecutive accepted bars. The later bar is still
/// processed; the error acts as a gap marker.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Error)]
#[error("data gap for {instrument}: {missing_bars} bars missing between {previous} and {received}")]
pub struct DataGapError {
    pub instrument: InstrumentId,
    pub previous: DateTime<Utc>,
    pub received: DateTime<Utc>,
    pub missing_bars: u64,
}

/// Invalid configuration, fatal for pipeline instantiation only.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("failed to read config file: {0}")]
    Io(String),

    #[error("{0}")]
    Ta(#[from] TaConfigError),

    #[error("{0}")]
    Alert(#[from] AlertConfigError),

    #[error("aggregator: {0}")]
    Aggregator(String),

    #[error("normalizer: {0}")]
    Normalizer(String),

    #[error("bar queue capacity must be > 0")]
    ZeroQueueCapacity,

    #[error("bar queue send timeout must be > 0")]
    ZeroSendTimeout,
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Error)]
pub enum SnapshotError {
    #[error("failed to (de)serialise snapshot: {0}")]
    Serde(String),

    #[error("failed to read or write snapshot: {0}")]
    Io(String),

    #[error("snapshot for {received} restored into pipeline for {expected}")]
    InstrumentMismatch {
        expected: InstrumentId,
        received: InstrumentId,
    },

    #[error("snapshot incompatible with configuration: {0}")]
    Incompatible(String),

    #[error("{0}")]
    Config(#[from] ConfigError),
}

impl From<serde_json::Error> for SnapshotError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value.to_string())
    }
}

impl From<std::io::Error> for SnapshotError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

/// Failures of the sharded async runtime.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Error)]
pub enum SystemError {
    #[error("bar queue for {0} is closed")]
    QueueClosed(InstrumentId),

    #[error("timed out waiting for space in bar queue for {0}")]
    SendTimeout(InstrumentId),

    #[error("pipeline task failed: {0}")]
    JoinError(String),

    #[error("{0}")]
    Config(#[from] ConfigError),
}

impl From<tokio::task::JoinError> for SystemError {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::JoinError(format!("{value:?}"))
    }
}

/// Non-fatal issue reported alongside a processed bar.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum PipelineWarning {
    #[error("{0}")]
    DataGap(#[from] DataGapError),

    #[error("{0}")]
    AlertDelivery(#[from] AlertDeliveryError),
}

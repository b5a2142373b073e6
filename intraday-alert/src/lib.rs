#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms,
    rust_2024_compatibility
)]

//! # Intraday-Alert
//! Turns pattern signals and indicator threshold crossings into [`Alert`](alert::Alert)s and
//! hands them to an external delivery collaborator.
//!
//! * **Deduplication**: one suppression window per `(instrument, source)` key. Repeat requests
//!   inside the window are folded into the original alert rather than re-alerted.
//! * **Priority queue**: bounded, ordered by severity then recency. Overflow drops the
//!   lowest-priority pending alert and reports it to the caller.
//! * **Delivery**: [`AlertSink`](sink::AlertSink) push interface with in-memory and tokio
//!   channel implementations.

/// [`AlertDeliveryError`](error::AlertDeliveryError) and configuration errors.
pub mod error;

/// [`Alert`](alert::Alert) record, identifiers, severities and requests.
pub mod alert;

/// Alert thresholds, suppression window and queue configuration.
pub mod config;

/// Indicator threshold crossing rules.
pub mod rule;

/// Deduplicating priority [`AlertDispatcher`](dispatcher::AlertDispatcher).
pub mod dispatcher;

/// [`AlertSink`](sink::AlertSink) delivery collaborators.
pub mod sink;

pub use alert::{Alert, AlertId, AlertRequest, AlertSeverity, AlertSource, AlertState};
pub use config::AlertConfig;
pub use dispatcher::{AlertDispatcher, DispatchReport, FlushPolicy, SubmitOutcome};
pub use error::{AlertConfigError, AlertDeliveryError};
pub use sink::{AlertSink, ChannelAlertSink, VecAlertSink};

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

//! # Intraday
//! Intraday decision support core: turns per-instrument price bar streams into indicator
//! values, chart pattern signals, deduplicated alerts and a weighted trading recommendation.
//!
//! Every instrument is processed by its own [`Pipeline`](pipeline::Pipeline):
//!
//! ```text
//! BarNormalizer -> IndicatorEngine -> PatternDetector -> { AlertDispatcher, Decision Aggregator }
//! ```
//!
//! Pipelines share nothing. They can be driven synchronously through a
//! [`PipelineTable`](table::PipelineTable) for deterministic replay, or concurrently through a
//! sharded tokio [`SystemHandle`](system::SystemHandle) with bounded per-instrument queues.
//!
//! ## Crates
//! * `intraday-instrument`: [`InstrumentId`](intraday_instrument::InstrumentId) and
//!   [`PriceBar`](intraday_instrument::PriceBar).
//! * `intraday-ta`: streaming indicators and finite-state pattern recognisers.
//! * `intraday-alert`: alert deduplication, prioritisation and delivery.

/// Defines all possible errors in Intraday core.
pub mod error;

/// Provides default Intraday core Tracing logging initialisers.
pub mod logging;

/// [`SystemConfig`](config::SystemConfig) and [`PipelineConfig`](config::PipelineConfig).
pub mod config;

/// [`BarNormalizer`](normalizer::BarNormalizer) validating bars before any stateful component.
pub mod normalizer;

/// Weighted-voting decision aggregator.
pub mod decision;

/// Per-instrument [`Pipeline`](pipeline::Pipeline).
pub mod pipeline;

/// Synchronous [`PipelineTable`](table::PipelineTable) keyed by instrument.
pub mod table;

/// Serialisable pipeline and system snapshots for warm restart.
pub mod snapshot;

/// Sharded async runtime: bounded bar queues, one consumer task per instrument and a read-only
/// [`SystemView`](system::SystemView).
pub mod system;

pub use config::{PipelineConfig, SystemConfig};
pub use decision::DecisionState;
pub use error::IntradayError;
pub use pipeline::{Pipeline, PipelineOutput};
pub use snapshot::{JsonSnapshot, PipelineSnapshot, SystemSnapshot};
pub use system::{SystemHandle, SystemView};
pub use table::PipelineTable;

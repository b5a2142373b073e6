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

//! # Intraday-Instrument
//! Core data structures shared by every Intraday crate:
//! * [`InstrumentId`](instrument::InstrumentId): `SmolStr` key identifying an instrument pipeline.
//! * [`PriceBar`](bar::PriceBar): normalised OHLCV bar, the unit of ingestion.

/// [`InstrumentId`](instrument::InstrumentId) key used to shard pipelines.
pub mod instrument;

/// OHLCV [`PriceBar`](bar::PriceBar) model and candlestick geometry helpers.
pub mod bar;

/// Utilities to assist testing.
pub mod test_utils;

pub use bar::PriceBar;
pub use instrument::InstrumentId;

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
#![allow(clippy::too_many_arguments)]

//! # Intraday-TA
//! Streaming technical analysis for Intraday pipelines.
//!
//! This crate provides:
//! * **Indicators**: incremental, O(1) amortised per-bar indicators (SMA, EMA, RSI, MACD,
//!   Bollinger Bands, VWAP, ATR) that track their own warm-up and never propagate non-finite
//!   values.
//! * **IndicatorEngine**: per-instrument owner of the configured indicators, emitting one
//!   [`IndicatorVector`](engine::IndicatorVector) per accepted bar.
//! * **Batch**: full-history reference computations used to audit the incremental path.
//! * **Patterns**: one explicit finite-state recogniser per configured pattern, driven by a
//!   [`PatternDetector`](pattern::detector::PatternDetector) that enforces cool-downs, signal
//!   non-overlap and validity windows.

/// Errors produced by indicator ingestion and configuration validation.
pub mod error;

/// Rolling-window accumulators (compensated sums, sliding Welford moments).
pub mod window;

/// Directional [`Bias`](signal::Bias) and crossover detection.
pub mod signal;

/// Indicator definitions and the [`Indicator`](indicator::Indicator) update contract.
pub mod indicator;

/// Per-instrument [`IndicatorEngine`](engine::IndicatorEngine).
pub mod engine;

/// Full recomputation of indicator series from raw bar history.
pub mod batch;

/// Pattern recognisers and the [`PatternDetector`](pattern::detector::PatternDetector).
pub mod pattern;

pub use engine::{IndicatorEngine, IndicatorVector};
pub use indicator::{IndicatorName, IndicatorSpec, IndicatorValue};
pub use pattern::{PatternSignal, PatternSpec, PatternType, detector::PatternDetector};
pub use signal::Bias;

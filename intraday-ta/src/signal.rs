use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Directional stance of an indicator vote, pattern or aggregated decision.
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
pub enum Bias {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl Bias {
    /// Signed vote weight of this bias: `+1`, `-1` or `0`.
    pub fn polarity(&self) -> f64 {
        match self {
            Bias::Bullish => 1.0,
            Bias::Bearish => -1.0,
            Bias::Neutral => 0.0,
        }
    }

    /// Bias from the sign of a weighted sum. Zero (or NaN) is neutral.
    pub fn from_sign(value: f64) -> Self {
        if value > 0.0 {
            Bias::Bullish
        } else if value < 0.0 {
            Bias::Bearish
        } else {
            Bias::Neutral
        }
    }
}

/// Type of crossover event detected between two data series.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum Cross {
    Above,
    Below,
}

/// Determine if a crossover occurred between the previous and current values.
///
/// A touch followed by a move away counts as a cross, two bars strictly on the same side do not.
pub fn crossover(prev_fast: f64, prev_slow: f64, fast: f64, slow: f64) -> Option<Cross> {
    if prev_fast <= prev_slow && fast > slow {
        Some(Cross::Above)
    } else if prev_fast >= prev_slow && fast < slow {
        Some(Cross::Below)
    } else {
        None
    }
}

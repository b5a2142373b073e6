use crate::indicator::{INSUFFICIENT_HISTORY, Indicator, IndicatorValue, finite};
use intraday_instrument::PriceBar;
use serde::{Deserialize, Serialize};

/// Exponential decay state shared by [`Ema`] and [`Macd`](super::macd::Macd).
///
/// Multiplier `k = 2 / (period + 1)`, seeded with the first observed value.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct EmaState {
    multiplier: f64,
    value: Option<f64>,
}

impl EmaState {
    pub fn new(period: usize) -> Self {
        Self {
            multiplier: 2.0 / (period as f64 + 1.0),
            value: None,
        }
    }

    /// Update with the next input and return the latest average.
    pub fn update(&mut self, input: f64) -> f64 {
        let next = match self.value {
            Some(prev) => self.multiplier * input + (1.0 - self.multiplier) * prev,
            None => input,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

/// Exponential moving average of the close.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Ema {
    period: usize,
    state: EmaState,
    observed: usize,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            state: EmaState::new(period),
            observed: 0,
        }
    }
}

impl Indicator for Ema {
    fn warm_up(&self) -> usize {
        self.period
    }

    fn update(&mut self, bar: &PriceBar) -> IndicatorValue {
        let value = self.state.update(bar.close);
        self.observed += 1;
        if self.observed < self.period {
            return INSUFFICIENT_HISTORY;
        }
        finite(value)
    }
}

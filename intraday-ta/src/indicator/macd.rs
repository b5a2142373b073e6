use crate::indicator::{
    INSUFFICIENT_HISTORY, Indicator, IndicatorValue, MacdOutput, OVERFLOW, ema::EmaState,
};
use intraday_instrument::PriceBar;
use serde::{Deserialize, Serialize};

/// MACD line (`EMA_fast - EMA_slow`), its signal EMA and the histogram.
///
/// All three averages are seeded from the first bar, the value is reported once `slow + signal - 1`
/// bars have been observed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Macd {
    slow_period: usize,
    signal_period: usize,
    fast: EmaState,
    slow: EmaState,
    signal: EmaState,
    observed: usize,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            slow_period: slow,
            signal_period: signal,
            fast: EmaState::new(fast),
            slow: EmaState::new(slow),
            signal: EmaState::new(signal),
            observed: 0,
        }
    }
}

impl Indicator for Macd {
    fn warm_up(&self) -> usize {
        self.slow_period + self.signal_period - 1
    }

    fn update(&mut self, bar: &PriceBar) -> IndicatorValue {
        let line = self.fast.update(bar.close) - self.slow.update(bar.close);
        let signal = self.signal.update(line);
        self.observed += 1;

        if self.observed < self.warm_up() {
            return INSUFFICIENT_HISTORY;
        }

        let output = MacdOutput {
            line,
            signal,
            histogram: line - signal,
        };
        if output.line.is_finite() && output.signal.is_finite() && output.histogram.is_finite() {
            IndicatorValue::Macd(output)
        } else {
            OVERFLOW
        }
    }
}

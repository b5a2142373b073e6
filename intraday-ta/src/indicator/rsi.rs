use crate::{
    indicator::{INSUFFICIENT_HISTORY, Indicator, IndicatorValue, finite},
    window::RollingSum,
};
use intraday_instrument::PriceBar;
use serde::{Deserialize, Serialize};

/// Neutral RSI reported for a window with neither gains nor losses.
pub const RSI_NEUTRAL: f64 = 50.0;

/// Relative Strength Index using simple rolling means of gains and losses over the last
/// `period` close-to-close differences.
///
/// Requires `period + 1` bars, since the first bar has no difference.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Rsi {
    period: usize,
    prev_close: Option<f64>,
    gains: RollingSum,
    losses: RollingSum,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev_close: None,
            gains: RollingSum::new(period),
            losses: RollingSum::new(period),
        }
    }
}

/// RSI from average gain and loss. Flat windows are neutral, loss-free windows are 100.
pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    let avg_gain = avg_gain.max(0.0);
    let avg_loss = avg_loss.max(0.0);
    match (avg_gain == 0.0, avg_loss == 0.0) {
        (true, true) => RSI_NEUTRAL,
        (_, true) => 100.0,
        _ => 100.0 - 100.0 / (1.0 + avg_gain / avg_loss),
    }
}

impl Indicator for Rsi {
    fn warm_up(&self) -> usize {
        self.period + 1
    }

    fn update(&mut self, bar: &PriceBar) -> IndicatorValue {
        let Some(prev_close) = self.prev_close.replace(bar.close) else {
            return INSUFFICIENT_HISTORY;
        };

        let change = bar.close - prev_close;
        self.gains.push(change.max(0.0));
        self.losses.push((-change).max(0.0));

        if !self.gains.is_full() {
            return INSUFFICIENT_HISTORY;
        }

        let period = self.period as f64;
        finite(rsi_from_averages(
            self.gains.sum() / period,
            self.losses.sum() / period,
        ))
    }
}

use crate::{
    indicator::{INSUFFICIENT_HISTORY, Indicator, IndicatorValue, finite},
    window::RollingSum,
};
use intraday_instrument::PriceBar;
use serde::{Deserialize, Serialize};

/// Simple moving average of the close over the last `period` bars.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Sma {
    period: usize,
    window: RollingSum,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            window: RollingSum::new(period),
        }
    }
}

impl Indicator for Sma {
    fn warm_up(&self) -> usize {
        self.period
    }

    fn update(&mut self, bar: &PriceBar) -> IndicatorValue {
        self.window.push(bar.close);
        if !self.window.is_full() {
            return INSUFFICIENT_HISTORY;
        }
        finite(self.window.sum() / self.period as f64)
    }
}

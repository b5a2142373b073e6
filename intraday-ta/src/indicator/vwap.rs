use crate::{
    indicator::{INSUFFICIENT_HISTORY, Indicator, IndicatorValue, OVERFLOW, finite},
    window::RollingSum,
};
use intraday_instrument::PriceBar;
use serde::{Deserialize, Serialize};

/// Rolling volume weighted average of the typical price over the last `period` bars.
///
/// A window with zero total volume has no defined VWAP and reports `ComputationOverflow`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Vwap {
    period: usize,
    price_volume: RollingSum,
    volume: RollingSum,
}

impl Vwap {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            price_volume: RollingSum::new(period),
            volume: RollingSum::new(period),
        }
    }
}

impl Indicator for Vwap {
    fn warm_up(&self) -> usize {
        self.period
    }

    fn update(&mut self, bar: &PriceBar) -> IndicatorValue {
        self.price_volume.push(bar.typical_price() * bar.volume);
        self.volume.push(bar.volume);

        if !self.volume.is_full() {
            return INSUFFICIENT_HISTORY;
        }

        let volume = self.volume.sum();
        if volume <= 0.0 {
            return OVERFLOW;
        }
        finite(self.price_volume.sum() / volume)
    }
}

use crate::indicator::{INSUFFICIENT_HISTORY, Indicator, IndicatorValue, finite};
use intraday_instrument::PriceBar;
use serde::{Deserialize, Serialize};

/// Average True Range with Wilder smoothing.
///
/// Seeded with the mean true range of the first `period` bars, thereafter
/// `atr = (atr_prev * (period - 1) + tr) / period`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Atr {
    period: usize,
    prev_close: Option<f64>,
    seed_sum: f64,
    observed: usize,
    value: Option<f64>,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev_close: None,
            seed_sum: 0.0,
            observed: 0,
            value: None,
        }
    }
}

/// True range of a bar given the previous close. The first bar uses `high - low`.
pub fn true_range(bar: &PriceBar, prev_close: Option<f64>) -> f64 {
    let range = bar.high - bar.low;
    match prev_close {
        Some(prev_close) => range
            .max((bar.high - prev_close).abs())
            .max((bar.low - prev_close).abs()),
        None => range,
    }
}

impl Indicator for Atr {
    fn warm_up(&self) -> usize {
        self.period
    }

    fn update(&mut self, bar: &PriceBar) -> IndicatorValue {
        let tr = true_range(bar, self.prev_close.replace(bar.close));
        self.observed += 1;

        let period = self.period as f64;
        let next = match self.value {
            Some(prev) => (prev * (period - 1.0) + tr) / period,
            None => {
                self.seed_sum += tr;
                if self.observed < self.period {
                    return INSUFFICIENT_HISTORY;
                }
                self.seed_sum / period
            }
        };

        self.value = Some(next);
        finite(next)
    }
}

use crate::{
    indicator::{BandsOutput, INSUFFICIENT_HISTORY, Indicator, IndicatorValue, OVERFLOW},
    window::RollingMoments,
};
use intraday_instrument::PriceBar;
use serde::{Deserialize, Serialize};

/// Bollinger Bands: SMA middle band, upper/lower at `std_dev` sample standard deviations.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Bollinger {
    period: usize,
    std_dev: f64,
    moments: RollingMoments,
}

impl Bollinger {
    pub fn new(period: usize, std_dev: f64) -> Self {
        Self {
            period,
            std_dev,
            moments: RollingMoments::new(period),
        }
    }
}

impl Indicator for Bollinger {
    fn warm_up(&self) -> usize {
        self.period
    }

    fn update(&mut self, bar: &PriceBar) -> IndicatorValue {
        self.moments.push(bar.close);
        if !self.moments.is_full() {
            return INSUFFICIENT_HISTORY;
        }

        let middle = self.moments.mean();
        let width = self.std_dev * self.moments.sample_variance().sqrt();
        let bands = BandsOutput {
            upper: middle + width,
            middle,
            lower: middle - width,
        };

        if bands.upper.is_finite() && bands.lower.is_finite() {
            IndicatorValue::Bands(bands)
        } else {
            OVERFLOW
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intraday_instrument::test_utils::{bars_from_closes, f64_is_eq};

    #[test]
    fn test_bollinger_bands() {
        let bars = bars_from_closes("X", &[1.0, 2.0, 3.0, 4.0, 5.0], 0.1);
        let mut bollinger = Bollinger::new(3, 2.0);

        let values = bars
            .iter()
            .map(|bar| bollinger.update(bar))
            .collect::<Vec<_>>();

        assert_eq!(values[0], INSUFFICIENT_HISTORY);
        assert_eq!(values[1], INSUFFICIENT_HISTORY);

        // window [3, 4, 5]: mean 4, sample std 1
        let IndicatorValue::Bands(bands) = values[4] else {
            panic!("expected defined bands");
        };
        assert!(f64_is_eq(bands.middle, 4.0, 1e-12));
        assert!(f64_is_eq(bands.upper, 6.0, 1e-12));
        assert!(f64_is_eq(bands.lower, 2.0, 1e-12));
    }

    #[test]
    fn test_bollinger_flat_market_collapses_bands() {
        let bars = bars_from_closes("X", &[100.0; 25], 0.0);
        let mut bollinger = Bollinger::new(20, 2.0);
        let last = bars.iter().map(|bar| bollinger.update(bar)).last();
        assert_eq!(
            last,
            Some(IndicatorValue::Bands(BandsOutput {
                upper: 100.0,
                middle: 100.0,
                lower: 100.0
            }))
        );
    }
}

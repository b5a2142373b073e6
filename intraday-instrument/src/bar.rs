use crate::instrument::InstrumentId;
use chrono::{DateTime, Utc};
use derive_more::Constructor;
use serde::{Deserialize, Serialize};

/// Normalised OHLCV price bar for a single [`InstrumentId`].
///
/// Bars for an instrument are ordered strictly by `time`. Once accepted by a pipeline a bar is
/// never mutated.
#[derive(Debug, Clone, PartialEq, PartialOrd, Deserialize, Serialize, Constructor)]
pub struct PriceBar {
    pub instrument: InstrumentId,
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Returns `true` if every price and volume field is a finite number.
    pub fn is_finite(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|value| value.is_finite())
    }

    /// Absolute distance between open and close.
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// Distance between high and low.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn upper_shadow(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_shadow(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    /// Typical price `(high + low + close) / 3`, used for volume weighting.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Green candle.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Red candle.
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{bar, time_plus_mins};

    #[test]
    fn test_candle_geometry() {
        struct TestCase {
            input: PriceBar,
            expected_body: f64,
            expected_upper: f64,
            expected_lower: f64,
        }

        let base = DateTime::<Utc>::MIN_UTC;

        let cases = vec![
            // TC0: green candle with both shadows
            TestCase {
                input: bar("X", time_plus_mins(base, 0), 10.0, 12.0, 9.0, 11.0, 1.0),
                expected_body: 1.0,
                expected_upper: 1.0,
                expected_lower: 1.0,
            },
            // TC1: red candle with no upper shadow
            TestCase {
                input: bar("X", time_plus_mins(base, 1), 11.0, 11.0, 8.0, 10.0, 1.0),
                expected_body: 1.0,
                expected_upper: 0.0,
                expected_lower: 2.0,
            },
            // TC2: flat candle
            TestCase {
                input: bar("X", time_plus_mins(base, 2), 10.0, 10.0, 10.0, 10.0, 0.0),
                expected_body: 0.0,
                expected_upper: 0.0,
                expected_lower: 0.0,
            },
        ];

        for (index, test) in cases.into_iter().enumerate() {
            assert_eq!(test.input.body(), test.expected_body, "TC{index} body failed");
            assert_eq!(
                test.input.upper_shadow(),
                test.expected_upper,
                "TC{index} upper shadow failed"
            );
            assert_eq!(
                test.input.lower_shadow(),
                test.expected_lower,
                "TC{index} lower shadow failed"
            );
        }
    }

    #[test]
    fn test_is_finite() {
        let base = DateTime::<Utc>::MIN_UTC;
        assert!(bar("X", base, 1.0, 1.0, 1.0, 1.0, 1.0).is_finite());
        assert!(!bar("X", base, 1.0, f64::INFINITY, 1.0, 1.0, 1.0).is_finite());
        assert!(!bar("X", base, 1.0, 1.0, 1.0, 1.0, f64::NAN).is_finite());
    }
}

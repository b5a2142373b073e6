use crate::error::TaConfigError;
use derive_more::Display;
use intraday_instrument::PriceBar;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::borrow::Borrow;

/// Average True Range with Wilder smoothing.
pub mod atr;

/// Bollinger Bands over a sliding sample standard deviation.
pub mod bollinger;

/// Exponential Moving Average.
pub mod ema;

/// Moving Average Convergence Divergence.
pub mod macd;

/// Relative Strength Index over rolling mean gains and losses.
pub mod rsi;

/// Simple Moving Average.
pub mod sma;

/// Rolling Volume Weighted Average Price.
pub mod vwap;

use atr::Atr;
use bollinger::Bollinger;
use ema::Ema;
use macd::Macd;
use rsi::Rsi;
use sma::Sma;
use vwap::Vwap;

/// Unique (per pipeline) configured name of an indicator, eg/ "ema_20".
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Deserialize, Serialize, Display,
)]
pub struct IndicatorName(pub SmolStr);

impl IndicatorName {
    pub fn new<S>(name: S) -> Self
    where
        S: Into<SmolStr>,
    {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for IndicatorName {
    fn from(value: &str) -> Self {
        Self(SmolStr::new(value))
    }
}

impl Borrow<str> for IndicatorName {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for IndicatorName {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

/// Configured indicator: a unique name plus the indicator kind and its parameters.
///
/// ```json
/// { "name": "macd", "kind": "macd", "fast": 12, "slow": 26, "signal": 9 }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IndicatorSpec {
    pub name: IndicatorName,
    #[serde(flatten)]
    pub kind: IndicatorKind,
}

impl IndicatorSpec {
    pub fn new<N>(name: N, kind: IndicatorKind) -> Self
    where
        N: Into<IndicatorName>,
    {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Validate the indicator parameters.
    pub fn validate(&self) -> Result<(), TaConfigError> {
        self.kind
            .validate()
            .map_err(|reason| TaConfigError::InvalidIndicator {
                name: self.name.clone(),
                reason,
            })
    }
}

/// Indicator kind and parameters.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndicatorKind {
    Sma { period: usize },
    Ema { period: usize },
    Rsi { period: usize },
    Macd { fast: usize, slow: usize, signal: usize },
    Bollinger { period: usize, std_dev: f64 },
    Vwap { period: usize },
    Atr { period: usize },
}

impl IndicatorKind {
    pub fn indicator_type(&self) -> IndicatorType {
        match self {
            IndicatorKind::Sma { .. } => IndicatorType::Sma,
            IndicatorKind::Ema { .. } => IndicatorType::Ema,
            IndicatorKind::Rsi { .. } => IndicatorType::Rsi,
            IndicatorKind::Macd { .. } => IndicatorType::Macd,
            IndicatorKind::Bollinger { .. } => IndicatorType::Bollinger,
            IndicatorKind::Vwap { .. } => IndicatorType::Vwap,
            IndicatorKind::Atr { .. } => IndicatorType::Atr,
        }
    }

    /// Number of bars that must be observed before the indicator value is defined.
    pub fn warm_up(&self) -> usize {
        match *self {
            IndicatorKind::Sma { period }
            | IndicatorKind::Ema { period }
            | IndicatorKind::Bollinger { period, .. }
            | IndicatorKind::Vwap { period }
            | IndicatorKind::Atr { period } => period,
            IndicatorKind::Rsi { period } => period + 1,
            IndicatorKind::Macd { slow, signal, .. } => slow + signal - 1,
        }
    }

    fn validate(&self) -> Result<(), String> {
        match *self {
            IndicatorKind::Sma { period }
            | IndicatorKind::Ema { period }
            | IndicatorKind::Rsi { period }
            | IndicatorKind::Vwap { period }
            | IndicatorKind::Atr { period } => {
                if period == 0 {
                    return Err("period must be > 0".to_string());
                }
            }
            IndicatorKind::Macd { fast, slow, signal } => {
                if fast == 0 || signal == 0 {
                    return Err("fast and signal periods must be > 0".to_string());
                }
                if fast >= slow {
                    return Err(format!("fast period {fast} must be < slow period {slow}"));
                }
            }
            IndicatorKind::Bollinger { period, std_dev } => {
                if period < 2 {
                    return Err("period must be >= 2 for a sample standard deviation".to_string());
                }
                if !std_dev.is_finite() || std_dev <= 0.0 {
                    return Err(format!("std_dev {std_dev} must be finite and > 0"));
                }
            }
        }
        Ok(())
    }
}

/// Discriminant of an [`IndicatorKind`], attached to every reading so consumers can interpret
/// the value without the configuration.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorType {
    Sma,
    Ema,
    Rsi,
    Macd,
    Bollinger,
    Vwap,
    Atr,
}

/// Why an indicator value is undefined for a bar.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedReason {
    /// Warm-up not yet satisfied.
    InsufficientHistory,
    /// Non-finite input or output.
    ComputationOverflow,
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct MacdOutput {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct BandsOutput {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Output of one indicator for one bar.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorValue {
    Undefined(UndefinedReason),
    Single(f64),
    Macd(MacdOutput),
    Bands(BandsOutput),
}

impl IndicatorValue {
    pub fn is_defined(&self) -> bool {
        !matches!(self, IndicatorValue::Undefined(_))
    }

    /// Extract a scalar component of the value, `None` if undefined or not applicable.
    pub fn component(&self, component: ValueComponent) -> Option<f64> {
        match (self, component) {
            (IndicatorValue::Single(value), ValueComponent::Value) => Some(*value),
            (IndicatorValue::Macd(macd), ValueComponent::Line) => Some(macd.line),
            (IndicatorValue::Macd(macd), ValueComponent::Signal) => Some(macd.signal),
            (IndicatorValue::Macd(macd), ValueComponent::Histogram) => Some(macd.histogram),
            (IndicatorValue::Bands(bands), ValueComponent::Upper) => Some(bands.upper),
            (IndicatorValue::Bands(bands), ValueComponent::Middle) => Some(bands.middle),
            (IndicatorValue::Bands(bands), ValueComponent::Lower) => Some(bands.lower),
            _ => None,
        }
    }

    /// Largest absolute difference between the components of two defined values of the same
    /// shape. `None` if the shapes (or definedness) differ.
    pub fn max_abs_diff(&self, other: &Self) -> Option<f64> {
        match (self, other) {
            (IndicatorValue::Undefined(a), IndicatorValue::Undefined(b)) => {
                (a == b).then_some(0.0)
            }
            (IndicatorValue::Single(a), IndicatorValue::Single(b)) => Some((a - b).abs()),
            (IndicatorValue::Macd(a), IndicatorValue::Macd(b)) => Some(
                (a.line - b.line)
                    .abs()
                    .max((a.signal - b.signal).abs())
                    .max((a.histogram - b.histogram).abs()),
            ),
            (IndicatorValue::Bands(a), IndicatorValue::Bands(b)) => Some(
                (a.upper - b.upper)
                    .abs()
                    .max((a.middle - b.middle).abs())
                    .max((a.lower - b.lower).abs()),
            ),
            _ => None,
        }
    }
}

/// Scalar component selector for multi-output indicators.
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
pub enum ValueComponent {
    #[default]
    Value,
    Line,
    Signal,
    Histogram,
    Upper,
    Middle,
    Lower,
}

/// Value of one configured indicator for one bar, tagged with its [`IndicatorType`].
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct IndicatorReading {
    pub kind: IndicatorType,
    pub value: IndicatorValue,
}

/// Incremental indicator contract.
///
/// `update` is called exactly once per accepted, finite bar in timestamp order and must run in
/// O(1) amortised time.
pub trait Indicator {
    /// Number of bars that must be observed before [`Self::update`] returns a defined value.
    fn warm_up(&self) -> usize;

    fn update(&mut self, bar: &PriceBar) -> IndicatorValue;
}

/// Map a computed scalar to an [`IndicatorValue`], never letting a non-finite value through.
pub(crate) fn finite(value: f64) -> IndicatorValue {
    if value.is_finite() {
        IndicatorValue::Single(value)
    } else {
        IndicatorValue::Undefined(UndefinedReason::ComputationOverflow)
    }
}

pub(crate) const INSUFFICIENT_HISTORY: IndicatorValue =
    IndicatorValue::Undefined(UndefinedReason::InsufficientHistory);

pub(crate) const OVERFLOW: IndicatorValue =
    IndicatorValue::Undefined(UndefinedReason::ComputationOverflow);

/// Configured indicator instance, dispatching to the concrete implementation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnyIndicator {
    Sma(Sma),
    Ema(Ema),
    Rsi(Rsi),
    Macd(Macd),
    Bollinger(Bollinger),
    Vwap(Vwap),
    Atr(Atr),
}

impl AnyIndicator {
    pub fn new(kind: &IndicatorKind) -> Self {
        match *kind {
            IndicatorKind::Sma { period } => Self::Sma(Sma::new(period)),
            IndicatorKind::Ema { period } => Self::Ema(Ema::new(period)),
            IndicatorKind::Rsi { period } => Self::Rsi(Rsi::new(period)),
            IndicatorKind::Macd { fast, slow, signal } => {
                Self::Macd(Macd::new(fast, slow, signal))
            }
            IndicatorKind::Bollinger { period, std_dev } => {
                Self::Bollinger(Bollinger::new(period, std_dev))
            }
            IndicatorKind::Vwap { period } => Self::Vwap(Vwap::new(period)),
            IndicatorKind::Atr { period } => Self::Atr(Atr::new(period)),
        }
    }

    pub fn indicator_type(&self) -> IndicatorType {
        match self {
            Self::Sma(_) => IndicatorType::Sma,
            Self::Ema(_) => IndicatorType::Ema,
            Self::Rsi(_) => IndicatorType::Rsi,
            Self::Macd(_) => IndicatorType::Macd,
            Self::Bollinger(_) => IndicatorType::Bollinger,
            Self::Vwap(_) => IndicatorType::Vwap,
            Self::Atr(_) => IndicatorType::Atr,
        }
    }
}

impl Indicator for AnyIndicator {
    fn warm_up(&self) -> usize {
        match self {
            Self::Sma(indicator) => indicator.warm_up(),
            Self::Ema(indicator) => indicator.warm_up(),
            Self::Rsi(indicator) => indicator.warm_up(),
            Self::Macd(indicator) => indicator.warm_up(),
            Self::Bollinger(indicator) => indicator.warm_up(),
            Self::Vwap(indicator) => indicator.warm_up(),
            Self::Atr(indicator) => indicator.warm_up(),
        }
    }

    fn update(&mut self, bar: &PriceBar) -> IndicatorValue {
        match self {
            Self::Sma(indicator) => indicator.update(bar),
            Self::Ema(indicator) => indicator.update(bar),
            Self::Rsi(indicator) => indicator.update(bar),
            Self::Macd(indicator) => indicator.update(bar),
            Self::Bollinger(indicator) => indicator.update(bar),
            Self::Vwap(indicator) => indicator.update(bar),
            Self::Atr(indicator) => indicator.update(bar),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_de_indicator_spec() {
        let input = r#"
        [
            { "name": "ema_20", "kind": "ema", "period": 20 },
            { "name": "macd", "kind": "macd", "fast": 12, "slow": 26, "signal": 9 },
            { "name": "bb", "kind": "bollinger", "period": 20, "std_dev": 2.0 }
        ]
        "#;

        let actual = serde_json::from_str::<Vec<IndicatorSpec>>(input).unwrap();
        let expected = vec![
            IndicatorSpec::new("ema_20", IndicatorKind::Ema { period: 20 }),
            IndicatorSpec::new(
                "macd",
                IndicatorKind::Macd {
                    fast: 12,
                    slow: 26,
                    signal: 9,
                },
            ),
            IndicatorSpec::new(
                "bb",
                IndicatorKind::Bollinger {
                    period: 20,
                    std_dev: 2.0,
                },
            ),
        ];

        assert_eq!(actual, expected);
    }

    #[test]
    fn test_indicator_spec_validate() {
        struct TestCase {
            input: IndicatorKind,
            expected_ok: bool,
        }

        let cases = vec![
            // TC0: valid sma
            TestCase {
                input: IndicatorKind::Sma { period: 5 },
                expected_ok: true,
            },
            // TC1: zero period
            TestCase {
                input: IndicatorKind::Rsi { period: 0 },
                expected_ok: false,
            },
            // TC2: fast >= slow
            TestCase {
                input: IndicatorKind::Macd {
                    fast: 26,
                    slow: 12,
                    signal: 9,
                },
                expected_ok: false,
            },
            // TC3: bollinger needs two samples
            TestCase {
                input: IndicatorKind::Bollinger {
                    period: 1,
                    std_dev: 2.0,
                },
                expected_ok: false,
            },
            // TC4: non-finite multiplier
            TestCase {
                input: IndicatorKind::Bollinger {
                    period: 20,
                    std_dev: f64::NAN,
                },
                expected_ok: false,
            },
            // TC5: valid macd
            TestCase {
                input: IndicatorKind::Macd {
                    fast: 12,
                    slow: 26,
                    signal: 9,
                },
                expected_ok: true,
            },
        ];

        for (index, test) in cases.into_iter().enumerate() {
            let spec = IndicatorSpec::new("test", test.input);
            assert_eq!(spec.validate().is_ok(), test.expected_ok, "TC{index} failed");
        }
    }

    #[test]
    fn test_warm_up_matches_kind() {
        let kinds = [
            IndicatorKind::Sma { period: 5 },
            IndicatorKind::Ema { period: 20 },
            IndicatorKind::Rsi { period: 14 },
            IndicatorKind::Macd {
                fast: 12,
                slow: 26,
                signal: 9,
            },
            IndicatorKind::Bollinger {
                period: 20,
                std_dev: 2.0,
            },
            IndicatorKind::Vwap { period: 10 },
            IndicatorKind::Atr { period: 14 },
        ];

        for kind in kinds {
            let indicator = AnyIndicator::new(&kind);
            assert_eq!(indicator.warm_up(), kind.warm_up(), "{kind:?}");
            assert_eq!(indicator.indicator_type(), kind.indicator_type());
        }
    }

    #[test]
    fn test_value_component() {
        let macd = IndicatorValue::Macd(MacdOutput {
            line: 1.0,
            signal: 0.5,
            histogram: 0.5,
        });
        assert_eq!(macd.component(ValueComponent::Line), Some(1.0));
        assert_eq!(macd.component(ValueComponent::Value), None);
        assert_eq!(INSUFFICIENT_HISTORY.component(ValueComponent::Value), None);
        assert!(!OVERFLOW.is_defined());
        assert_eq!(finite(f64::INFINITY), OVERFLOW);
    }
}

use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use derive_more::Display;
use indexmap::IndexMap;
use intraday_instrument::InstrumentId;
use intraday_ta::{
    Bias, IndicatorName, IndicatorValue, IndicatorVector, PatternSignal, PatternType,
    indicator::IndicatorType,
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Weights and thresholds of the weighted-voting [`aggregate`].
///
/// Every indicator and pattern type votes with weight `indicator_weight` / `pattern_weight`
/// unless overridden by name / type. A weight of zero removes the source from the vote.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub indicator_weight: f64,
    pub pattern_weight: f64,
    pub indicator_weights: IndexMap<IndicatorName, f64>,
    pub pattern_weights: IndexMap<PatternType, f64>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            indicator_weight: 1.0,
            pattern_weight: 1.0,
            indicator_weights: IndexMap::new(),
            pattern_weights: IndexMap::new(),
        }
    }
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid_weight = [self.indicator_weight, self.pattern_weight]
            .into_iter()
            .chain(self.indicator_weights.values().copied())
            .chain(self.pattern_weights.values().copied())
            .find(|weight| !(weight.is_finite() && *weight >= 0.0));

        if let Some(weight) = invalid_weight {
            return Err(ConfigError::Aggregator(format!(
                "weight {weight} must be finite and >= 0"
            )));
        }

        if !(self.rsi_oversold < self.rsi_overbought
            && (0.0..=100.0).contains(&self.rsi_oversold)
            && (0.0..=100.0).contains(&self.rsi_overbought))
        {
            return Err(ConfigError::Aggregator(format!(
                "rsi thresholds {} / {} must satisfy 0 <= oversold < overbought <= 100",
                self.rsi_oversold, self.rsi_overbought
            )));
        }

        Ok(())
    }

    fn indicator_weight(&self, name: &IndicatorName) -> f64 {
        self.indicator_weights
            .get(name)
            .copied()
            .unwrap_or(self.indicator_weight)
    }

    fn pattern_weight(&self, pattern: PatternType) -> f64 {
        self.pattern_weights
            .get(&pattern)
            .copied()
            .unwrap_or(self.pattern_weight)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum ContributionSource {
    #[display("{_0}")]
    Indicator(IndicatorName),
    #[display("{_0}")]
    Pattern(PatternType),
}

/// One vote of the weighted sum.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Contribution {
    pub source: ContributionSource,
    pub bias: Bias,
    pub weight: f64,
    /// Vote strength in `[0, 1]`: `1` for indicators, the confidence for patterns.
    pub strength: f64,
}

impl Contribution {
    pub fn signed(&self) -> f64 {
        self.bias.polarity() * self.weight * self.strength
    }
}

/// Current trading recommendation of one instrument.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DecisionState {
    pub instrument: InstrumentId,
    pub bias: Bias,
    /// Normalised net weighted margin in `[0, 1]`.
    pub confidence: f64,
    pub contributions: Vec<Contribution>,
    pub rationale: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DecisionState {
    /// Neutral decision with no contributors.
    pub fn neutral(instrument: InstrumentId) -> Self {
        Self {
            instrument,
            bias: Bias::Neutral,
            confidence: 0.0,
            contributions: Vec::new(),
            rationale: "no contributing signals".to_string(),
            updated_at: None,
        }
    }
}

/// Directional vote of one indicator reading against the bar close.
///
/// Trend indicators (SMA, EMA, VWAP) are bullish with the close above them. RSI is bullish
/// oversold and bearish overbought. MACD follows the line against its signal. Bollinger Bands
/// are bullish below the lower band and bearish above the upper band. ATR carries no direction
/// and never votes.
pub fn indicator_vote(
    kind: IndicatorType,
    value: &IndicatorValue,
    close: f64,
    config: &AggregatorConfig,
) -> Option<Bias> {
    let vote = match (kind, value) {
        (IndicatorType::Atr, _) => return None,
        (IndicatorType::Rsi, IndicatorValue::Single(rsi)) => {
            if *rsi < config.rsi_oversold {
                Bias::Bullish
            } else if *rsi > config.rsi_overbought {
                Bias::Bearish
            } else {
                Bias::Neutral
            }
        }
        (_, IndicatorValue::Single(level)) => Bias::from_sign(close - level),
        (_, IndicatorValue::Macd(macd)) => Bias::from_sign(macd.line - macd.signal),
        (_, IndicatorValue::Bands(bands)) => {
            if close < bands.lower {
                Bias::Bullish
            } else if close > bands.upper {
                Bias::Bearish
            } else {
                Bias::Neutral
            }
        }
        (_, IndicatorValue::Undefined(_)) => return None,
    };
    Some(vote)
}

/// Weighted vote over the current [`IndicatorVector`] and active [`PatternSignal`]s.
///
/// `sum = Σ polarity · weight · strength` and `norm = Σ weight` over every contributor
/// (neutral votes included). The bias is the sign of `sum` and the confidence is
/// `min(|sum| / norm, 1)`. No contributors, or a zero sum, is neutral with confidence `0`.
///
/// Pure function of its inputs.
pub fn aggregate(
    instrument: &InstrumentId,
    vector: Option<&IndicatorVector>,
    signals: &[PatternSignal],
    config: &AggregatorConfig,
) -> DecisionState {
    let indicator_votes = vector.into_iter().flat_map(|vector| {
        vector.values.iter().filter_map(move |(name, reading)| {
            let bias = indicator_vote(reading.kind, &reading.value, vector.close, config)?;
            Some(Contribution {
                source: ContributionSource::Indicator(name.clone()),
                bias,
                weight: config.indicator_weight(name),
                strength: 1.0,
            })
        })
    });

    let pattern_votes = signals.iter().map(|signal| Contribution {
        source: ContributionSource::Pattern(signal.pattern_type),
        bias: signal.pattern_type.bias(),
        weight: config.pattern_weight(signal.pattern_type),
        strength: signal.confidence.clamp(0.0, 1.0),
    });

    let contributions = indicator_votes
        .chain(pattern_votes)
        .filter(|contribution| contribution.weight > 0.0)
        .collect::<Vec<_>>();

    let sum = contributions.iter().map(Contribution::signed).sum::<f64>();
    let norm = contributions
        .iter()
        .map(|contribution| contribution.weight)
        .sum::<f64>();

    let bias = Bias::from_sign(sum);
    let confidence = if bias == Bias::Neutral || norm <= 0.0 {
        0.0
    } else {
        (sum.abs() / norm).min(1.0)
    };

    let rationale = if contributions.is_empty() {
        "no contributing signals".to_string()
    } else {
        contributions
            .iter()
            .map(|contribution| format!("{} {}", contribution.source, contribution.bias))
            .join("; ")
    };

    DecisionState {
        instrument: instrument.clone(),
        bias,
        confidence,
        contributions,
        rationale,
        updated_at: vector.map(|vector| vector.time),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intraday_instrument::test_utils::{f64_is_eq, session_open};
    use intraday_ta::indicator::{BandsOutput, IndicatorReading, MacdOutput, UndefinedReason};

    fn signal(pattern_type: PatternType, confidence: f64) -> PatternSignal {
        PatternSignal {
            instrument: InstrumentId::new("X"),
            pattern_type,
            start_bar: 0,
            end_bar: 1,
            confidence,
            detected_at: session_open(),
            valid_until_bar: 11,
        }
    }

    fn vector(close: f64, values: Vec<(&str, IndicatorType, IndicatorValue)>) -> IndicatorVector {
        IndicatorVector {
            instrument: InstrumentId::new("X"),
            time: session_open(),
            bar_index: 40,
            close,
            values: values
                .into_iter()
                .map(|(name, kind, value)| {
                    (IndicatorName::new(name), IndicatorReading { kind, value })
                })
                .collect(),
        }
    }

    #[test]
    fn test_indicator_vote() {
        let config = AggregatorConfig::default();

        struct TestCase {
            kind: IndicatorType,
            value: IndicatorValue,
            close: f64,
            expected: Option<Bias>,
        }

        let cases = vec![
            // TC0: close above EMA
            TestCase {
                kind: IndicatorType::Ema,
                value: IndicatorValue::Single(99.0),
                close: 100.0,
                expected: Some(Bias::Bullish),
            },
            // TC1: close on VWAP
            TestCase {
                kind: IndicatorType::Vwap,
                value: IndicatorValue::Single(100.0),
                close: 100.0,
                expected: Some(Bias::Neutral),
            },
            // TC2: RSI oversold
            TestCase {
                kind: IndicatorType::Rsi,
                value: IndicatorValue::Single(25.0),
                close: 100.0,
                expected: Some(Bias::Bullish),
            },
            // TC3: RSI overbought
            TestCase {
                kind: IndicatorType::Rsi,
                value: IndicatorValue::Single(75.0),
                close: 100.0,
                expected: Some(Bias::Bearish),
            },
            // TC4: MACD line below signal
            TestCase {
                kind: IndicatorType::Macd,
                value: IndicatorValue::Macd(MacdOutput {
                    line: -0.2,
                    signal: 0.1,
                    histogram: -0.3,
                }),
                close: 100.0,
                expected: Some(Bias::Bearish),
            },
            // TC5: close below lower band
            TestCase {
                kind: IndicatorType::Bollinger,
                value: IndicatorValue::Bands(BandsOutput {
                    upper: 104.0,
                    middle: 102.0,
                    lower: 100.5,
                }),
                close: 100.0,
                expected: Some(Bias::Bullish),
            },
            // TC6: ATR never votes
            TestCase {
                kind: IndicatorType::Atr,
                value: IndicatorValue::Single(1.0),
                close: 100.0,
                expected: None,
            },
            // TC7: undefined is a non-signal
            TestCase {
                kind: IndicatorType::Sma,
                value: IndicatorValue::Undefined(UndefinedReason::InsufficientHistory),
                close: 100.0,
                expected: None,
            },
        ];

        for (index, test) in cases.into_iter().enumerate() {
            let actual = indicator_vote(test.kind, &test.value, test.close, &config);
            assert_eq!(actual, test.expected, "TC{index} failed");
        }
    }

    #[test]
    fn test_weighted_patterns_use_net_margin() {
        let config = AggregatorConfig {
            pattern_weights: IndexMap::from([
                (PatternType::BullishBreakout, 2.0),
                (PatternType::BearishEngulfing, 1.0),
            ]),
            ..AggregatorConfig::default()
        };
        let signals = vec![
            signal(PatternType::BullishBreakout, 1.0),
            signal(PatternType::BearishEngulfing, 1.0),
        ];

        let decision = aggregate(&InstrumentId::new("X"), None, &signals, &config);
        assert_eq!(decision.bias, Bias::Bullish);
        assert!(f64_is_eq(decision.confidence, 1.0 / 3.0, 1e-12));
        assert_eq!(decision.contributions.len(), 2);
        assert_eq!(decision.rationale, "BullishBreakout Bullish; BearishEngulfing Bearish");
    }

    #[test]
    fn test_no_contributors_is_neutral() {
        let decision = aggregate(
            &InstrumentId::new("X"),
            Some(&vector(
                100.0,
                vec![(
                    "sma_20",
                    IndicatorType::Sma,
                    IndicatorValue::Undefined(UndefinedReason::InsufficientHistory),
                )],
            )),
            &[],
            &AggregatorConfig::default(),
        );
        assert_eq!(decision.bias, Bias::Neutral);
        assert_eq!(decision.confidence, 0.0);
        assert!(decision.contributions.is_empty());
        assert_eq!(decision.updated_at, Some(session_open()));
    }

    #[test]
    fn test_tie_is_neutral() {
        let decision = aggregate(
            &InstrumentId::new("X"),
            Some(&vector(
                100.0,
                vec![
                    ("ema_20", IndicatorType::Ema, IndicatorValue::Single(99.0)),
                    ("rsi_14", IndicatorType::Rsi, IndicatorValue::Single(80.0)),
                ],
            )),
            &[],
            &AggregatorConfig::default(),
        );
        assert_eq!(decision.bias, Bias::Neutral);
        assert_eq!(decision.confidence, 0.0);
        assert_eq!(decision.contributions.len(), 2);
    }

    #[test]
    fn test_indicators_and_patterns_combine() {
        let config = AggregatorConfig {
            indicator_weights: IndexMap::from([(IndicatorName::new("atr_14"), 5.0)]),
            ..AggregatorConfig::default()
        };
        let vector = vector(
            100.0,
            vec![
                ("ema_20", IndicatorType::Ema, IndicatorValue::Single(99.0)),
                ("rsi_14", IndicatorType::Rsi, IndicatorValue::Single(50.0)),
                ("atr_14", IndicatorType::Atr, IndicatorValue::Single(1.5)),
            ],
        );
        let signals = vec![signal(PatternType::Hammer, 0.5)];

        // ema +1, rsi 0, hammer +0.5 over norm 3
        let decision = aggregate(&InstrumentId::new("X"), Some(&vector), &signals, &config);
        assert_eq!(decision.bias, Bias::Bullish);
        assert!(f64_is_eq(decision.confidence, 0.5, 1e-12));
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let config = AggregatorConfig::default();
        let vector = vector(
            100.0,
            vec![("ema_20", IndicatorType::Ema, IndicatorValue::Single(101.0))],
        );
        let signals = vec![signal(PatternType::DoubleBottom, 0.7)];

        let first = aggregate(&InstrumentId::new("X"), Some(&vector), &signals, &config);
        let second = aggregate(&InstrumentId::new("X"), Some(&vector), &signals, &config);
        assert_eq!(first, second);
    }
}

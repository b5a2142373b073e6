use crate::{
    engine::IndicatorVector,
    error::TaConfigError,
    indicator::{IndicatorName, IndicatorSpec, IndicatorType},
    signal::Bias,
};
use chrono::{DateTime, Utc};
use derive_more::Display;
use intraday_instrument::{InstrumentId, PriceBar};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Single and two-bar candlestick recognisers (Doji, Hammer, Engulfing).
pub mod candle;

/// Lookback-extreme breakout with volume confirmation.
pub mod breakout;

/// Double top / double bottom with neckline confirmation.
pub mod double;

/// MACD line / signal line crossover.
pub mod crossover;

/// [`PatternDetector`](detector::PatternDetector) owning one recogniser per configured pattern.
pub mod detector;

use breakout::{BreakoutRecognizer, BreakoutTemplate};
use candle::{
    DojiRecognizer, DojiTemplate, EngulfingRecognizer, EngulfingTemplate, HammerRecognizer,
    HammerTemplate,
};
use crossover::{CrossoverTemplate, MacdCrossoverRecognizer};
use double::{DoubleExtremeRecognizer, DoubleExtremeTemplate};

/// Default number of bars after firing during which the same pattern type cannot fire again.
pub const DEFAULT_COOLDOWN_BARS: u64 = 5;

/// Default number of bars after `end_bar` a [`PatternSignal`] remains active.
pub const DEFAULT_VALID_FOR_BARS: u64 = 10;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Doji,
    Hammer,
    BullishEngulfing,
    BearishEngulfing,
    BullishBreakout,
    BearishBreakout,
    DoubleTop,
    DoubleBottom,
    MacdBullishCrossover,
    MacdBearishCrossover,
}

impl PatternType {
    /// Directional polarity used when voting in the decision aggregator.
    pub fn bias(&self) -> Bias {
        match self {
            PatternType::Doji => Bias::Neutral,
            PatternType::Hammer
            | PatternType::BullishEngulfing
            | PatternType::BullishBreakout
            | PatternType::DoubleBottom
            | PatternType::MacdBullishCrossover => Bias::Bullish,
            PatternType::BearishEngulfing
            | PatternType::BearishBreakout
            | PatternType::DoubleTop
            | PatternType::MacdBearishCrossover => Bias::Bearish,
        }
    }
}

/// A completed pattern occurrence. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PatternSignal {
    pub instrument: InstrumentId,
    pub pattern_type: PatternType,
    pub start_bar: u64,
    pub end_bar: u64,
    /// Template match score in `[0, 1]`.
    pub confidence: f64,
    pub detected_at: DateTime<Utc>,
    /// Last bar index at which the signal is still considered active.
    pub valid_until_bar: u64,
}

impl PatternSignal {
    pub fn is_active(&self, bar_index: u64) -> bool {
        bar_index <= self.valid_until_bar
    }
}

/// Raw recogniser output, before cool-down and overlap rules are applied.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct PatternMatch {
    pub start_bar: u64,
    pub end_bar: u64,
    pub confidence: f64,
}

/// Configured pattern: kind and template parameters plus firing rules.
///
/// ```json
/// { "pattern": "bullish_breakout", "lookback": 20, "cooldown_bars": 5, "valid_for_bars": 10 }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PatternSpec {
    #[serde(flatten)]
    pub kind: PatternKind,
    #[serde(default = "default_cooldown_bars")]
    pub cooldown_bars: u64,
    #[serde(default = "default_valid_for_bars")]
    pub valid_for_bars: u64,
}

fn default_cooldown_bars() -> u64 {
    DEFAULT_COOLDOWN_BARS
}

fn default_valid_for_bars() -> u64 {
    DEFAULT_VALID_FOR_BARS
}

impl PatternSpec {
    pub fn new(kind: PatternKind) -> Self {
        Self {
            kind,
            cooldown_bars: DEFAULT_COOLDOWN_BARS,
            valid_for_bars: DEFAULT_VALID_FOR_BARS,
        }
    }

    pub fn with_cooldown(self, cooldown_bars: u64) -> Self {
        Self {
            cooldown_bars,
            ..self
        }
    }

    pub fn with_validity(self, valid_for_bars: u64) -> Self {
        Self {
            valid_for_bars,
            ..self
        }
    }

    pub fn pattern_type(&self) -> PatternType {
        self.kind.pattern_type()
    }

    /// Validate template parameters, and that MACD crossover patterns reference a configured
    /// MACD indicator.
    pub fn validate(&self, indicators: &[IndicatorSpec]) -> Result<(), TaConfigError> {
        let pattern = self.pattern_type();
        let invalid = |reason: String| TaConfigError::InvalidPattern { pattern, reason };

        match &self.kind {
            PatternKind::Doji(template) => template.validate().map_err(invalid),
            PatternKind::Hammer(template) => template.validate().map_err(invalid),
            PatternKind::BullishEngulfing(template) | PatternKind::BearishEngulfing(template) => {
                template.validate().map_err(invalid)
            }
            PatternKind::BullishBreakout(template) | PatternKind::BearishBreakout(template) => {
                template.validate().map_err(invalid)
            }
            PatternKind::DoubleTop(template) | PatternKind::DoubleBottom(template) => {
                template.validate().map_err(invalid)
            }
            PatternKind::MacdBullishCrossover(template)
            | PatternKind::MacdBearishCrossover(template) => {
                template.validate().map_err(invalid)?;
                let is_macd = indicators.iter().any(|spec| {
                    spec.name == template.indicator
                        && spec.kind.indicator_type() == IndicatorType::Macd
                });
                if is_macd {
                    Ok(())
                } else {
                    Err(TaConfigError::UnknownIndicator {
                        pattern,
                        indicator: template.indicator.clone(),
                    })
                }
            }
        }
    }
}

/// Pattern kind with its template parameters.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum PatternKind {
    Doji(DojiTemplate),
    Hammer(HammerTemplate),
    BullishEngulfing(EngulfingTemplate),
    BearishEngulfing(EngulfingTemplate),
    BullishBreakout(BreakoutTemplate),
    BearishBreakout(BreakoutTemplate),
    DoubleTop(DoubleExtremeTemplate),
    DoubleBottom(DoubleExtremeTemplate),
    MacdBullishCrossover(CrossoverTemplate),
    MacdBearishCrossover(CrossoverTemplate),
}

impl PatternKind {
    pub fn pattern_type(&self) -> PatternType {
        match self {
            PatternKind::Doji(_) => PatternType::Doji,
            PatternKind::Hammer(_) => PatternType::Hammer,
            PatternKind::BullishEngulfing(_) => PatternType::BullishEngulfing,
            PatternKind::BearishEngulfing(_) => PatternType::BearishEngulfing,
            PatternKind::BullishBreakout(_) => PatternType::BullishBreakout,
            PatternKind::BearishBreakout(_) => PatternType::BearishBreakout,
            PatternKind::DoubleTop(_) => PatternType::DoubleTop,
            PatternKind::DoubleBottom(_) => PatternType::DoubleBottom,
            PatternKind::MacdBullishCrossover(_) => PatternType::MacdBullishCrossover,
            PatternKind::MacdBearishCrossover(_) => PatternType::MacdBearishCrossover,
        }
    }
}

/// Read-only view handed to a recogniser for the current bar.
///
/// `window` already contains `bar` as its most recent entry; nothing after `bar_index` is
/// visible.
#[derive(Debug, Copy, Clone)]
pub struct PatternContext<'a> {
    pub bar_index: u64,
    pub bar: &'a PriceBar,
    pub window: &'a BarWindow,
    pub vector: &'a IndicatorVector,
}

/// Finite-state pattern recogniser contract.
pub trait PatternRecognizer {
    fn pattern_type(&self) -> PatternType;

    /// Bars that must be in the session window before the recogniser is stepped.
    fn min_history(&self) -> usize;

    /// Advance the automaton by one bar, returning a match when a terminal state is reached.
    ///
    /// Implementations reset to their initial state after returning a match.
    fn step(&mut self, context: &PatternContext<'_>) -> Option<PatternMatch>;

    /// Return to the initial state.
    fn reset(&mut self);
}

/// Configured recogniser instance, dispatching to the concrete automaton.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnyRecognizer {
    Doji(DojiRecognizer),
    Hammer(HammerRecognizer),
    Engulfing(EngulfingRecognizer),
    Breakout(BreakoutRecognizer),
    DoubleExtreme(DoubleExtremeRecognizer),
    MacdCrossover(MacdCrossoverRecognizer),
}

impl AnyRecognizer {
    pub fn new(kind: &PatternKind) -> Self {
        match kind {
            PatternKind::Doji(template) => Self::Doji(DojiRecognizer::new(*template)),
            PatternKind::Hammer(template) => Self::Hammer(HammerRecognizer::new(*template)),
            PatternKind::BullishEngulfing(template) => {
                Self::Engulfing(EngulfingRecognizer::new(*template, Bias::Bullish))
            }
            PatternKind::BearishEngulfing(template) => {
                Self::Engulfing(EngulfingRecognizer::new(*template, Bias::Bearish))
            }
            PatternKind::BullishBreakout(template) => {
                Self::Breakout(BreakoutRecognizer::new(*template, Bias::Bullish))
            }
            PatternKind::BearishBreakout(template) => {
                Self::Breakout(BreakoutRecognizer::new(*template, Bias::Bearish))
            }
            PatternKind::DoubleTop(template) => {
                Self::DoubleExtreme(DoubleExtremeRecognizer::new(*template, Bias::Bearish))
            }
            PatternKind::DoubleBottom(template) => {
                Self::DoubleExtreme(DoubleExtremeRecognizer::new(*template, Bias::Bullish))
            }
            PatternKind::MacdBullishCrossover(template) => Self::MacdCrossover(
                MacdCrossoverRecognizer::new(template.clone(), Bias::Bullish),
            ),
            PatternKind::MacdBearishCrossover(template) => Self::MacdCrossover(
                MacdCrossoverRecognizer::new(template.clone(), Bias::Bearish),
            ),
        }
    }
}

impl PatternRecognizer for AnyRecognizer {
    fn pattern_type(&self) -> PatternType {
        match self {
            Self::Doji(recognizer) => recognizer.pattern_type(),
            Self::Hammer(recognizer) => recognizer.pattern_type(),
            Self::Engulfing(recognizer) => recognizer.pattern_type(),
            Self::Breakout(recognizer) => recognizer.pattern_type(),
            Self::DoubleExtreme(recognizer) => recognizer.pattern_type(),
            Self::MacdCrossover(recognizer) => recognizer.pattern_type(),
        }
    }

    fn min_history(&self) -> usize {
        match self {
            Self::Doji(recognizer) => recognizer.min_history(),
            Self::Hammer(recognizer) => recognizer.min_history(),
            Self::Engulfing(recognizer) => recognizer.min_history(),
            Self::Breakout(recognizer) => recognizer.min_history(),
            Self::DoubleExtreme(recognizer) => recognizer.min_history(),
            Self::MacdCrossover(recognizer) => recognizer.min_history(),
        }
    }

    fn step(&mut self, context: &PatternContext<'_>) -> Option<PatternMatch> {
        match self {
            Self::Doji(recognizer) => recognizer.step(context),
            Self::Hammer(recognizer) => recognizer.step(context),
            Self::Engulfing(recognizer) => recognizer.step(context),
            Self::Breakout(recognizer) => recognizer.step(context),
            Self::DoubleExtreme(recognizer) => recognizer.step(context),
            Self::MacdCrossover(recognizer) => recognizer.step(context),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Doji(recognizer) => recognizer.reset(),
            Self::Hammer(recognizer) => recognizer.reset(),
            Self::Engulfing(recognizer) => recognizer.reset(),
            Self::Breakout(recognizer) => recognizer.reset(),
            Self::DoubleExtreme(recognizer) => recognizer.reset(),
            Self::MacdCrossover(recognizer) => recognizer.reset(),
        }
    }
}

/// Bounded window of the most recent processed bars of the current session.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BarWindow {
    capacity: usize,
    /// Bar index of the oldest bar in `bars`.
    start_index: u64,
    bars: VecDeque<PriceBar>,
}

impl BarWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            start_index: 0,
            bars: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Append the bar with the provided stream index, evicting the oldest once full.
    pub fn push(&mut self, bar_index: u64, bar: PriceBar) {
        if self.bars.is_empty() {
            self.start_index = bar_index;
        }
        self.bars.push_back(bar);
        if self.bars.len() > self.capacity {
            self.bars.pop_front();
            self.start_index += 1;
        }
    }

    pub fn clear(&mut self) {
        self.bars.clear();
        self.start_index = 0;
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Bar index of the oldest bar in the window.
    pub fn start_index(&self) -> u64 {
        self.start_index
    }

    /// Bar with the provided stream index, if still inside the window.
    pub fn get(&self, bar_index: u64) -> Option<&PriceBar> {
        let offset = bar_index.checked_sub(self.start_index)?;
        self.bars.get(usize::try_from(offset).ok()?)
    }

    /// Bar `back` positions before the most recent (`0` is the most recent bar).
    pub fn back(&self, back: usize) -> Option<&PriceBar> {
        let index = self.bars.len().checked_sub(back + 1)?;
        self.bars.get(index)
    }

    /// Iterate `(bar_index, bar)` over the window, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (u64, &PriceBar)> {
        let start_index = self.start_index;
        self.bars
            .iter()
            .enumerate()
            .map(move |(offset, bar)| (start_index + offset as u64, bar))
    }
}

/// Clamp a template score into `[0, 1]`, mapping NaN to zero.
pub(crate) fn clamp_confidence(score: f64) -> f64 {
    if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) }
}

/// Validate a template ratio parameter.
pub(crate) fn check_ratio(name: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(format!("{name} {value} must be finite and >= 0"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::IndicatorKind;
    use intraday_instrument::test_utils::flat_bar;

    #[test]
    fn test_de_pattern_spec() {
        let input = r#"
        [
            { "pattern": "doji" },
            { "pattern": "bullish_breakout", "lookback": 10, "cooldown_bars": 3 },
            { "pattern": "macd_bullish_crossover", "indicator": "macd", "valid_for_bars": 2 }
        ]
        "#;

        let actual = serde_json::from_str::<Vec<PatternSpec>>(input).unwrap();

        assert_eq!(actual[0], PatternSpec::new(PatternKind::Doji(DojiTemplate::default())));
        assert_eq!(
            actual[1],
            PatternSpec::new(PatternKind::BullishBreakout(BreakoutTemplate {
                lookback: 10,
                ..BreakoutTemplate::default()
            }))
            .with_cooldown(3)
        );
        assert_eq!(
            actual[2],
            PatternSpec::new(PatternKind::MacdBullishCrossover(CrossoverTemplate::new(
                "macd"
            )))
            .with_validity(2)
        );
    }

    #[test]
    fn test_validate_macd_crossover_requires_macd_indicator() {
        let spec = PatternSpec::new(PatternKind::MacdBearishCrossover(CrossoverTemplate::new(
            "macd",
        )));

        let with_macd = vec![IndicatorSpec::new(
            "macd",
            IndicatorKind::Macd {
                fast: 12,
                slow: 26,
                signal: 9,
            },
        )];
        assert_eq!(spec.validate(&with_macd), Ok(()));

        let wrong_kind = vec![IndicatorSpec::new("macd", IndicatorKind::Ema { period: 9 })];
        assert_eq!(
            spec.validate(&wrong_kind),
            Err(TaConfigError::UnknownIndicator {
                pattern: PatternType::MacdBearishCrossover,
                indicator: IndicatorName::new("macd"),
            })
        );
    }

    #[test]
    fn test_bar_window_indexing() {
        let mut window = BarWindow::new(3);
        for index in 10..15 {
            window.push(index, flat_bar("X", index as i64, index as f64, 1.0));
        }

        assert_eq!(window.len(), 3);
        assert_eq!(window.start_index(), 12);
        assert_eq!(window.get(11), None);
        assert_eq!(window.get(12).map(|bar| bar.close), Some(12.0));
        assert_eq!(window.get(14).map(|bar| bar.close), Some(14.0));
        assert_eq!(window.get(15), None);
        assert_eq!(window.back(0).map(|bar| bar.close), Some(14.0));
        assert_eq!(window.back(2).map(|bar| bar.close), Some(12.0));
        assert_eq!(window.back(3), None);
        assert_eq!(
            window.iter().map(|(index, _)| index).collect::<Vec<_>>(),
            vec![12, 13, 14]
        );
    }

    #[test]
    fn test_pattern_type_bias() {
        assert_eq!(PatternType::Doji.bias(), Bias::Neutral);
        assert_eq!(PatternType::DoubleBottom.bias(), Bias::Bullish);
        assert_eq!(PatternType::DoubleTop.bias(), Bias::Bearish);
        assert_eq!(PatternType::MacdBearishCrossover.bias(), Bias::Bearish);
    }
}

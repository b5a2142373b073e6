use crate::{
    pattern::{
        PatternContext, PatternMatch, PatternRecognizer, PatternType, check_ratio,
        clamp_confidence,
    },
    signal::Bias,
};
use intraday_instrument::PriceBar;
use serde::{Deserialize, Serialize};

/// Doji: body no larger than `max_body_ratio` of the bar range.
///
/// Confidence is `1.0` for a zero body, falling linearly to `0.0` at the threshold. Bars with a
/// zero range carry no shape and are ignored.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DojiTemplate {
    pub max_body_ratio: f64,
}

impl Default for DojiTemplate {
    fn default() -> Self {
        Self {
            max_body_ratio: 0.1,
        }
    }
}

impl DojiTemplate {
    pub(crate) fn validate(&self) -> Result<(), String> {
        check_ratio("max_body_ratio", self.max_body_ratio)
    }

    fn score(&self, bar: &PriceBar) -> Option<f64> {
        let range = bar.range();
        if range <= 0.0 {
            return None;
        }

        let threshold = self.max_body_ratio * range;
        let body = bar.body();
        if body > threshold {
            return None;
        }

        if threshold == 0.0 {
            Some(1.0)
        } else {
            Some(1.0 - body / threshold)
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct DojiRecognizer {
    template: DojiTemplate,
}

impl DojiRecognizer {
    pub fn new(template: DojiTemplate) -> Self {
        Self { template }
    }
}

impl PatternRecognizer for DojiRecognizer {
    fn pattern_type(&self) -> PatternType {
        PatternType::Doji
    }

    fn min_history(&self) -> usize {
        1
    }

    fn step(&mut self, context: &PatternContext<'_>) -> Option<PatternMatch> {
        self.template.score(context.bar).map(|score| PatternMatch {
            start_bar: context.bar_index,
            end_bar: context.bar_index,
            confidence: clamp_confidence(score),
        })
    }

    fn reset(&mut self) {}
}

/// Hammer: small body, long lower shadow and short upper shadow.
///
/// * `body < max_body_ratio * range`
/// * `lower_shadow >= min_lower_shadow_ratio * body`
/// * `upper_shadow <= max_upper_shadow_ratio * body`
///
/// Confidence is the share of the range taken by the lower shadow.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HammerTemplate {
    pub max_body_ratio: f64,
    pub min_lower_shadow_ratio: f64,
    pub max_upper_shadow_ratio: f64,
}

impl Default for HammerTemplate {
    fn default() -> Self {
        Self {
            max_body_ratio: 0.3,
            min_lower_shadow_ratio: 2.0,
            max_upper_shadow_ratio: 1.0,
        }
    }
}

impl HammerTemplate {
    pub(crate) fn validate(&self) -> Result<(), String> {
        check_ratio("max_body_ratio", self.max_body_ratio)?;
        check_ratio("min_lower_shadow_ratio", self.min_lower_shadow_ratio)?;
        check_ratio("max_upper_shadow_ratio", self.max_upper_shadow_ratio)
    }

    fn score(&self, bar: &PriceBar) -> Option<f64> {
        let range = bar.range();
        if range <= 0.0 {
            return None;
        }

        let body = bar.body();
        let lower = bar.lower_shadow();
        let matched = body < self.max_body_ratio * range
            && lower >= self.min_lower_shadow_ratio * body
            && bar.upper_shadow() <= self.max_upper_shadow_ratio * body;

        matched.then(|| lower / range)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct HammerRecognizer {
    template: HammerTemplate,
}

impl HammerRecognizer {
    pub fn new(template: HammerTemplate) -> Self {
        Self { template }
    }
}

impl PatternRecognizer for HammerRecognizer {
    fn pattern_type(&self) -> PatternType {
        PatternType::Hammer
    }

    fn min_history(&self) -> usize {
        1
    }

    fn step(&mut self, context: &PatternContext<'_>) -> Option<PatternMatch> {
        self.template.score(context.bar).map(|score| PatternMatch {
            start_bar: context.bar_index,
            end_bar: context.bar_index,
            confidence: clamp_confidence(score),
        })
    }

    fn reset(&mut self) {}
}

/// Engulfing: the body of the current bar contains the opposite-coloured body of the previous
/// bar.
///
/// Confidence is `0.5` when both bodies are equal, rising towards `1.0` as the previous body
/// becomes negligible relative to the engulfing body.
#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngulfingTemplate {
    /// Minimum body of the engulfing bar as a share of its range.
    pub min_body_ratio: f64,
}

impl EngulfingTemplate {
    pub(crate) fn validate(&self) -> Result<(), String> {
        check_ratio("min_body_ratio", self.min_body_ratio)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize, Serialize)]
pub enum EngulfingState {
    #[default]
    Idle,
    /// Previous bar has the colour opposite to the pattern direction.
    Setup { bar_index: u64, open: f64, close: f64 },
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngulfingRecognizer {
    template: EngulfingTemplate,
    bias: Bias,
    state: EngulfingState,
}

impl EngulfingRecognizer {
    pub fn new(template: EngulfingTemplate, bias: Bias) -> Self {
        Self {
            template,
            bias,
            state: EngulfingState::Idle,
        }
    }

    pub fn state(&self) -> EngulfingState {
        self.state
    }

    fn is_setup(&self, bar: &PriceBar) -> bool {
        match self.bias {
            Bias::Bullish => bar.is_bearish(),
            _ => bar.is_bullish(),
        }
    }

    fn engulfs(&self, bar: &PriceBar, prev_open: f64, prev_close: f64) -> bool {
        let contained = match self.bias {
            Bias::Bullish => {
                bar.is_bullish() && bar.open <= prev_close && bar.close >= prev_open
            }
            _ => bar.is_bearish() && bar.open >= prev_close && bar.close <= prev_open,
        };
        contained && bar.body() >= self.template.min_body_ratio * bar.range()
    }
}

impl PatternRecognizer for EngulfingRecognizer {
    fn pattern_type(&self) -> PatternType {
        match self.bias {
            Bias::Bullish => PatternType::BullishEngulfing,
            _ => PatternType::BearishEngulfing,
        }
    }

    fn min_history(&self) -> usize {
        1
    }

    fn step(&mut self, context: &PatternContext<'_>) -> Option<PatternMatch> {
        let bar = context.bar;

        let matched = match self.state {
            EngulfingState::Setup {
                bar_index,
                open,
                close,
            } if bar_index + 1 == context.bar_index && self.engulfs(bar, open, close) => {
                let prev_body = (close - open).abs();
                Some(PatternMatch {
                    start_bar: bar_index,
                    end_bar: context.bar_index,
                    confidence: clamp_confidence(0.5 + 0.5 * (1.0 - prev_body / bar.body())),
                })
            }
            _ => None,
        };

        self.state = if matched.is_none() && self.is_setup(bar) {
            EngulfingState::Setup {
                bar_index: context.bar_index,
                open: bar.open,
                close: bar.close,
            }
        } else {
            EngulfingState::Idle
        };

        matched
    }

    fn reset(&mut self) {
        self.state = EngulfingState::Idle;
    }
}

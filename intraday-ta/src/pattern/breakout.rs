use crate::{
    pattern::{
        PatternContext, PatternMatch, PatternRecognizer, PatternType, check_ratio,
        clamp_confidence,
    },
    signal::Bias,
};
use serde::{Deserialize, Serialize};

/// Breakout: a close strictly beyond the extreme of the previous `lookback` bars, on volume of
/// at least `volume_multiplier` times their average, that holds for `confirmation_bars` further
/// closes.
///
/// Confidence is `0.5` at exactly the required volume, saturating at `1.0` for twice the
/// required volume.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakoutTemplate {
    pub lookback: usize,
    pub volume_multiplier: f64,
    pub confirmation_bars: usize,
}

impl Default for BreakoutTemplate {
    fn default() -> Self {
        Self {
            lookback: 20,
            volume_multiplier: 1.5,
            confirmation_bars: 1,
        }
    }
}

impl BreakoutTemplate {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.lookback == 0 {
            return Err("lookback must be > 0".to_string());
        }
        check_ratio("volume_multiplier", self.volume_multiplier)
    }

    fn confidence(&self, volume_ratio: f64) -> f64 {
        if self.volume_multiplier > 0.0 {
            clamp_confidence(0.5 * volume_ratio / self.volume_multiplier)
        } else {
            1.0
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize, Serialize)]
pub enum BreakoutState {
    #[default]
    Idle,
    AwaitingConfirmation {
        level: f64,
        start_bar: u64,
        volume_ratio: f64,
        confirmed: usize,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct BreakoutRecognizer {
    template: BreakoutTemplate,
    bias: Bias,
    state: BreakoutState,
}

impl BreakoutRecognizer {
    pub fn new(template: BreakoutTemplate, bias: Bias) -> Self {
        Self {
            template,
            bias,
            state: BreakoutState::Idle,
        }
    }

    pub fn state(&self) -> BreakoutState {
        self.state
    }

    fn is_beyond(&self, close: f64, level: f64) -> bool {
        match self.bias {
            Bias::Bullish => close > level,
            _ => close < level,
        }
    }

    /// Level and volume ratio if the current bar breaks out of the lookback range.
    fn trigger(&self, context: &PatternContext<'_>) -> Option<(f64, f64)> {
        let prior = (1..=self.template.lookback)
            .map(|back| context.window.back(back))
            .collect::<Option<Vec<_>>>()?;

        let level = match self.bias {
            Bias::Bullish => prior.iter().map(|bar| bar.high).fold(f64::MIN, f64::max),
            _ => prior.iter().map(|bar| bar.low).fold(f64::MAX, f64::min),
        };
        if !self.is_beyond(context.bar.close, level) {
            return None;
        }

        let average_volume =
            prior.iter().map(|bar| bar.volume).sum::<f64>() / self.template.lookback as f64;
        if average_volume <= 0.0 {
            return None;
        }

        let volume_ratio = context.bar.volume / average_volume;
        (volume_ratio >= self.template.volume_multiplier).then_some((level, volume_ratio))
    }
}

impl PatternRecognizer for BreakoutRecognizer {
    fn pattern_type(&self) -> PatternType {
        match self.bias {
            Bias::Bullish => PatternType::BullishBreakout,
            _ => PatternType::BearishBreakout,
        }
    }

    fn min_history(&self) -> usize {
        self.template.lookback + 1
    }

    fn step(&mut self, context: &PatternContext<'_>) -> Option<PatternMatch> {
        if let BreakoutState::AwaitingConfirmation {
            level,
            start_bar,
            volume_ratio,
            confirmed,
        } = self.state
        {
            if self.is_beyond(context.bar.close, level) {
                let confirmed = confirmed + 1;
                if confirmed >= self.template.confirmation_bars {
                    self.reset();
                    return Some(PatternMatch {
                        start_bar,
                        end_bar: context.bar_index,
                        confidence: self.template.confidence(volume_ratio),
                    });
                }
                self.state = BreakoutState::AwaitingConfirmation {
                    level,
                    start_bar,
                    volume_ratio,
                    confirmed,
                };
                return None;
            }

            // Failed to hold the level
            self.reset();
        }

        let (level, volume_ratio) = self.trigger(context)?;
        if self.template.confirmation_bars == 0 {
            return Some(PatternMatch {
                start_bar: context.bar_index,
                end_bar: context.bar_index,
                confidence: self.template.confidence(volume_ratio),
            });
        }

        self.state = BreakoutState::AwaitingConfirmation {
            level,
            start_bar: context.bar_index,
            volume_ratio,
            confirmed: 0,
        };
        None
    }

    fn reset(&mut self) {
        self.state = BreakoutState::Idle;
    }
}

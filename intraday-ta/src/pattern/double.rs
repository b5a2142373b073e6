use crate::{
    pattern::{
        PatternContext, PatternMatch, PatternRecognizer, PatternType, check_ratio,
        clamp_confidence,
    },
    signal::Bias,
};
use intraday_instrument::PriceBar;
use serde::{Deserialize, Serialize};

/// Double top / double bottom.
///
/// Two swing extremes within `tolerance` (relative) of each other, at least `min_separation`
/// bars apart, separated by a retracement of at least `min_retracement`, confirmed by a close
/// through the neckline (the retracement extreme) within `max_span` bars of the first extreme.
///
/// A swing extreme at bar `i` is only known once `swing` further bars have been processed, so
/// confirmation always lags by `swing` bars.
///
/// Confidence is `1.0` for equal extremes, falling to `0.5` at the tolerance boundary.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DoubleExtremeTemplate {
    pub swing: usize,
    pub tolerance: f64,
    pub min_separation: u64,
    pub max_span: u64,
    pub min_retracement: f64,
}

impl Default for DoubleExtremeTemplate {
    fn default() -> Self {
        Self {
            swing: 2,
            tolerance: 0.02,
            min_separation: 3,
            max_span: 60,
            min_retracement: 0.01,
        }
    }
}

impl DoubleExtremeTemplate {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.swing == 0 {
            return Err("swing must be > 0".to_string());
        }
        if self.max_span <= self.min_separation {
            return Err(format!(
                "max_span {} must be > min_separation {}",
                self.max_span, self.min_separation
            ));
        }
        check_ratio("tolerance", self.tolerance)?;
        check_ratio("min_retracement", self.min_retracement)
    }

    fn confidence(&self, first: f64, second: f64) -> f64 {
        let allowed = self.tolerance * first.abs();
        if allowed == 0.0 {
            1.0
        } else {
            clamp_confidence(0.5 + 0.5 * (1.0 - (second - first).abs() / allowed))
        }
    }
}

/// Automaton states. Prices are oriented so that the pattern extremes are always maxima: a
/// double bottom tracks negated lows.
///
/// `trough` is `f64::MAX` until a valley after the first extreme has been observed.
#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize, Serialize)]
pub enum DoubleExtremeState {
    #[default]
    Idle,
    FirstExtreme {
        first_bar: u64,
        first: f64,
        trough: f64,
    },
    Retracement {
        first_bar: u64,
        first: f64,
        trough: f64,
    },
    SecondExtreme {
        first_bar: u64,
        first: f64,
        second: f64,
        neckline: f64,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct DoubleExtremeRecognizer {
    template: DoubleExtremeTemplate,
    /// `Bearish` for a double top, `Bullish` for a double bottom.
    bias: Bias,
    state: DoubleExtremeState,
}

impl DoubleExtremeRecognizer {
    pub fn new(template: DoubleExtremeTemplate, bias: Bias) -> Self {
        Self {
            template,
            bias,
            state: DoubleExtremeState::Idle,
        }
    }

    pub fn state(&self) -> DoubleExtremeState {
        self.state
    }

    fn is_top(&self) -> bool {
        !matches!(self.bias, Bias::Bullish)
    }

    fn peak(&self, bar: &PriceBar) -> f64 {
        if self.is_top() { bar.high } else { -bar.low }
    }

    fn valley(&self, bar: &PriceBar) -> f64 {
        if self.is_top() { bar.low } else { -bar.high }
    }

    fn close(&self, bar: &PriceBar) -> f64 {
        if self.is_top() { bar.close } else { -bar.close }
    }

    /// Oriented peak of bar `candidate` if it is a confirmed swing extreme given the window.
    fn swing_extreme(&self, context: &PatternContext<'_>, candidate: u64) -> Option<f64> {
        let swing = self.template.swing as u64;
        let peak = self.peak(context.window.get(candidate)?);

        for index in candidate.checked_sub(swing)?..candidate {
            if self.peak(context.window.get(index)?) >= peak {
                return None;
            }
        }
        for index in candidate + 1..=context.bar_index {
            if self.peak(context.window.get(index)?) > peak {
                return None;
            }
        }
        Some(peak)
    }

    fn first_bar(&self) -> Option<u64> {
        match self.state {
            DoubleExtremeState::Idle => None,
            DoubleExtremeState::FirstExtreme { first_bar, .. }
            | DoubleExtremeState::Retracement { first_bar, .. }
            | DoubleExtremeState::SecondExtreme { first_bar, .. } => Some(first_bar),
        }
    }

    fn retraced(&self, first: f64, trough: f64) -> bool {
        trough <= first - self.template.min_retracement * first.abs()
    }

    /// Advance the search states with the swing candidate `swing` bars behind the current bar.
    fn advance_search(&mut self, context: &PatternContext<'_>) {
        let Some(candidate) = context
            .bar_index
            .checked_sub(self.template.swing as u64)
        else {
            return;
        };
        let extreme = self.swing_extreme(context, candidate);
        let Some(valley) = context.window.get(candidate).map(|bar| self.valley(bar)) else {
            return;
        };

        self.state = match (self.state, extreme) {
            (DoubleExtremeState::Idle, Some(peak)) => DoubleExtremeState::FirstExtreme {
                first_bar: candidate,
                first: peak,
                trough: f64::MAX,
            },
            (DoubleExtremeState::Idle, None) => DoubleExtremeState::Idle,

            (
                DoubleExtremeState::FirstExtreme { first, .. }
                | DoubleExtremeState::Retracement { first, .. },
                Some(peak),
            ) if peak > first + self.template.tolerance * first.abs() => {
                // Higher extreme replaces the first
                DoubleExtremeState::FirstExtreme {
                    first_bar: candidate,
                    first: peak,
                    trough: f64::MAX,
                }
            }

            (
                DoubleExtremeState::Retracement {
                    first_bar,
                    first,
                    trough,
                },
                Some(peak),
            ) if candidate.saturating_sub(first_bar) >= self.template.min_separation
                && (peak - first).abs() <= self.template.tolerance * first.abs() =>
            {
                DoubleExtremeState::SecondExtreme {
                    first_bar,
                    first,
                    second: peak,
                    neckline: trough,
                }
            }

            (
                DoubleExtremeState::FirstExtreme {
                    first_bar,
                    first,
                    trough,
                },
                _,
            ) => {
                let trough = trough.min(valley);
                if self.retraced(first, trough) {
                    DoubleExtremeState::Retracement {
                        first_bar,
                        first,
                        trough,
                    }
                } else {
                    DoubleExtremeState::FirstExtreme {
                        first_bar,
                        first,
                        trough,
                    }
                }
            }

            (
                DoubleExtremeState::Retracement {
                    first_bar,
                    first,
                    trough,
                },
                _,
            ) => DoubleExtremeState::Retracement {
                first_bar,
                first,
                trough: trough.min(valley),
            },

            (state @ DoubleExtremeState::SecondExtreme { .. }, _) => state,
        };
    }
}

impl PatternRecognizer for DoubleExtremeRecognizer {
    fn pattern_type(&self) -> PatternType {
        if self.is_top() {
            PatternType::DoubleTop
        } else {
            PatternType::DoubleBottom
        }
    }

    fn min_history(&self) -> usize {
        2 * self.template.swing + 1
    }

    fn step(&mut self, context: &PatternContext<'_>) -> Option<PatternMatch> {
        if let Some(first_bar) = self.first_bar() {
            if context.bar_index.saturating_sub(first_bar) > self.template.max_span {
                self.reset();
            }
        }

        if !matches!(self.state, DoubleExtremeState::SecondExtreme { .. }) {
            self.advance_search(context);
        }

        let DoubleExtremeState::SecondExtreme {
            first_bar,
            first,
            second,
            neckline,
        } = self.state
        else {
            return None;
        };

        if self.close(context.bar) < neckline {
            self.reset();
            return Some(PatternMatch {
                start_bar: first_bar,
                end_bar: context.bar_index,
                confidence: self.template.confidence(first, second),
            });
        }

        let highest = first.max(second);
        if self.peak(context.bar) > highest + self.template.tolerance * highest.abs() {
            self.reset();
        }
        None
    }

    fn reset(&mut self) {
        self.state = DoubleExtremeState::Idle;
    }
}

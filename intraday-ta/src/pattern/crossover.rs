use crate::{
    indicator::{IndicatorName, IndicatorValue},
    pattern::{
        PatternContext, PatternMatch, PatternRecognizer, PatternType, check_ratio,
        clamp_confidence,
    },
    signal::{Bias, Cross, crossover},
};
use serde::{Deserialize, Serialize};

/// MACD line crossing its signal line, read from the named MACD indicator of the current
/// [`IndicatorVector`](crate::engine::IndicatorVector).
///
/// Confidence starts at `0.5` and grows with the histogram separation on the crossing bar,
/// saturating at `1.0` once `|histogram| >= saturation * close`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CrossoverTemplate {
    pub indicator: IndicatorName,
    #[serde(default = "default_saturation")]
    pub saturation: f64,
}

fn default_saturation() -> f64 {
    0.001
}

impl CrossoverTemplate {
    pub fn new<N>(indicator: N) -> Self
    where
        N: Into<IndicatorName>,
    {
        Self {
            indicator: indicator.into(),
            saturation: default_saturation(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        check_ratio("saturation", self.saturation)
    }

    fn confidence(&self, histogram: f64, close: f64) -> f64 {
        let scale = self.saturation * close.abs();
        if scale == 0.0 {
            1.0
        } else {
            clamp_confidence(0.5 + 0.5 * (histogram.abs() / scale).min(1.0))
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize, Serialize)]
pub enum CrossoverState {
    /// No defined MACD value on the previous bar.
    #[default]
    Unarmed,
    Armed {
        bar_index: u64,
        line: f64,
        signal: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MacdCrossoverRecognizer {
    template: CrossoverTemplate,
    bias: Bias,
    state: CrossoverState,
}

impl MacdCrossoverRecognizer {
    pub fn new(template: CrossoverTemplate, bias: Bias) -> Self {
        Self {
            template,
            bias,
            state: CrossoverState::Unarmed,
        }
    }

    pub fn state(&self) -> CrossoverState {
        self.state
    }

    fn wanted(&self) -> Cross {
        match self.bias {
            Bias::Bullish => Cross::Above,
            _ => Cross::Below,
        }
    }
}

impl PatternRecognizer for MacdCrossoverRecognizer {
    fn pattern_type(&self) -> PatternType {
        match self.bias {
            Bias::Bullish => PatternType::MacdBullishCrossover,
            _ => PatternType::MacdBearishCrossover,
        }
    }

    fn min_history(&self) -> usize {
        1
    }

    fn step(&mut self, context: &PatternContext<'_>) -> Option<PatternMatch> {
        let value = context.vector.value(self.template.indicator.as_str());
        let Some(IndicatorValue::Macd(macd)) = value else {
            self.reset();
            return None;
        };

        let matched = match self.state {
            CrossoverState::Armed {
                bar_index,
                line,
                signal,
            } if bar_index + 1 == context.bar_index => {
                crossover(line, signal, macd.line, macd.signal)
                    .filter(|cross| *cross == self.wanted())
                    .map(|_| PatternMatch {
                        start_bar: bar_index,
                        end_bar: context.bar_index,
                        confidence: self.template.confidence(macd.histogram, context.bar.close),
                    })
            }
            _ => None,
        };

        // The current bar arms the next comparison, including right after a match
        self.state = CrossoverState::Armed {
            bar_index: context.bar_index,
            line: macd.line,
            signal: macd.signal,
        };

        matched
    }

    fn reset(&mut self) {
        self.state = CrossoverState::Unarmed;
    }
}

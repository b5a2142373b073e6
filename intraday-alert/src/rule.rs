use crate::{
    alert::{AlertRequest, AlertSeverity, AlertSource},
    error::AlertConfigError,
};
use intraday_ta::{
    IndicatorName, IndicatorSpec, IndicatorVector,
    indicator::{IndicatorType, ValueComponent},
    signal::{Cross, crossover},
};
use serde::{Deserialize, Serialize};

/// Indicator threshold rule, firing on the bar where the selected component crosses `level`.
///
/// Crossing `Above` requires the previous value `<= level` and the current value `> level`
/// (mirrored for `Below`). A bar with an undefined value breaks the comparison chain.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IndicatorRule {
    pub indicator: IndicatorName,
    #[serde(default)]
    pub component: ValueComponent,
    pub crossing: Cross,
    pub level: f64,
    #[serde(default = "default_rule_severity")]
    pub severity: AlertSeverity,
}

fn default_rule_severity() -> AlertSeverity {
    AlertSeverity::Warning
}

impl IndicatorRule {
    pub fn validate(&self, indicators: &[IndicatorSpec]) -> Result<(), AlertConfigError> {
        let invalid = |reason: String| AlertConfigError::InvalidRule {
            indicator: self.indicator.clone(),
            reason,
        };

        if !self.level.is_finite() {
            return Err(invalid(format!("level {} is not finite", self.level)));
        }

        let spec = indicators
            .iter()
            .find(|spec| spec.name == self.indicator)
            .ok_or_else(|| invalid("indicator is not configured".to_string()))?;

        let kind = spec.kind.indicator_type();
        if !has_component(kind, self.component) {
            return Err(invalid(format!("{kind} has no {} component", self.component)));
        }

        Ok(())
    }

    fn source(&self) -> AlertSource {
        AlertSource::Indicator {
            indicator: self.indicator.clone(),
            crossing: self.crossing,
        }
    }
}

fn has_component(kind: IndicatorType, component: ValueComponent) -> bool {
    match kind {
        IndicatorType::Macd => matches!(
            component,
            ValueComponent::Line | ValueComponent::Signal | ValueComponent::Histogram
        ),
        IndicatorType::Bollinger => matches!(
            component,
            ValueComponent::Upper | ValueComponent::Middle | ValueComponent::Lower
        ),
        _ => component == ValueComponent::Value,
    }
}

/// Evaluates every [`IndicatorRule`] against consecutive [`IndicatorVector`]s.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RuleEvaluator {
    rules: Vec<IndicatorRule>,
    previous: Vec<Option<f64>>,
}

impl RuleEvaluator {
    pub fn new(rules: Vec<IndicatorRule>) -> Self {
        let previous = vec![None; rules.len()];
        Self { rules, previous }
    }

    pub fn rules(&self) -> &[IndicatorRule] {
        &self.rules
    }

    /// Forget the previous values so no crossing spans a session boundary.
    pub fn reset_session(&mut self) {
        self.previous.fill(None);
    }

    /// [`AlertRequest`]s for every rule whose threshold is crossed on this vector.
    pub fn evaluate(&mut self, vector: &IndicatorVector) -> Vec<AlertRequest> {
        self.rules
            .iter()
            .zip(self.previous.iter_mut())
            .filter_map(|(rule, previous)| {
                let current = vector
                    .value(rule.indicator.as_str())
                    .and_then(|value| value.component(rule.component));
                let prior = std::mem::replace(previous, current);

                let (prior, current) = (prior?, current?);
                let cross = crossover(prior, rule.level, current, rule.level)?;
                (cross == rule.crossing).then(|| AlertRequest {
                    instrument: vector.instrument.clone(),
                    severity: rule.severity,
                    source: rule.source(),
                    message: format!(
                        "{} {} {} crossed {} {} at {current:.4}",
                        vector.instrument, rule.indicator, rule.component, rule.crossing, rule.level
                    ),
                    time: vector.time,
                })
            })
            .collect()
    }
}

use indexmap::IndexMap;
use intraday::{
    Pipeline, PipelineConfig, PipelineOutput, decision::AggregatorConfig,
    decision::ContributionSource,
};
use intraday_alert::{AlertSource, VecAlertSink};
use intraday_instrument::{InstrumentId, test_utils::bars_from_closes};
use intraday_ta::{
    Bias, IndicatorSpec, PatternSpec, PatternType,
    indicator::IndicatorKind,
    pattern::{PatternKind, double::DoubleExtremeTemplate},
};
use std::sync::Arc;

const DOUBLE_TOP: [f64; 14] = [
    100.0, 101.0, 102.0, 103.0, 104.0, 105.0, 103.0, 101.5, 103.0, 104.9, 103.0, 101.0, 99.0,
    98.0,
];

fn config(aggregator: AggregatorConfig) -> Arc<PipelineConfig> {
    Arc::new(PipelineConfig {
        indicators: vec![IndicatorSpec::new("sma_3", IndicatorKind::Sma { period: 3 })],
        patterns: vec![PatternSpec::new(PatternKind::DoubleTop(
            DoubleExtremeTemplate {
                swing: 1,
                tolerance: 0.01,
                min_separation: 2,
                max_span: 30,
                min_retracement: 0.002,
            },
        ))],
        aggregator,
        ..PipelineConfig::default()
    })
}

fn run(config: Arc<PipelineConfig>) -> (Pipeline, Vec<PipelineOutput>) {
    let mut pipeline = Pipeline::new(InstrumentId::new("X"), config).unwrap();
    let sink = VecAlertSink::default();
    let outputs = bars_from_closes("X", &DOUBLE_TOP, 0.0)
        .iter()
        .map(|bar| pipeline.process(bar, &sink).unwrap())
        .collect();
    (pipeline, outputs)
}

#[test]
fn double_top_drives_bearish_decision() {
    // Indicator votes removed so the pattern is the only contributor
    let (pipeline, outputs) = run(config(AggregatorConfig {
        indicator_weight: 0.0,
        ..AggregatorConfig::default()
    }));

    let fired = outputs
        .iter()
        .find(|output| !output.signals.is_empty())
        .unwrap();
    assert_eq!(fired.signals.len(), 1);

    let signal = &fired.signals[0];
    assert_eq!(signal.pattern_type, PatternType::DoubleTop);
    assert_eq!(fired.decision.bias, Bias::Bearish);
    assert_eq!(fired.decision.confidence, signal.confidence);
    assert_eq!(
        fired.decision.contributions[0].source,
        ContributionSource::Pattern(PatternType::DoubleTop)
    );
    assert_eq!(fired.decision.rationale, "DoubleTop Bearish");
    assert_eq!(fired.decision.updated_at, Some(fired.vector.time));

    // Alerted only when confident enough
    let alerted = pipeline
        .config()
        .alerts
        .pattern_severity(signal.confidence)
        .is_some();
    assert_eq!(
        fired
            .alerts
            .iter()
            .any(|alert| alert.source == AlertSource::Pattern {
                pattern: PatternType::DoubleTop
            }),
        alerted
    );

    // Signal stays active for the rest of the sequence
    assert_eq!(pipeline.active_signals(), &fired.signals[..]);
    assert_eq!(pipeline.decision().bias, Bias::Bearish);
}

#[test]
fn decision_is_reproducible_from_current_state() {
    let (pipeline, outputs) = run(config(AggregatorConfig::default()));

    for output in &outputs {
        assert_eq!(output.decision.instrument, InstrumentId::new("X"));
        assert!((0.0..=1.0).contains(&output.decision.confidence));
    }
    assert_eq!(&pipeline.recompute(), pipeline.decision());
    assert_eq!(outputs.last().map(|output| &output.decision), Some(pipeline.decision()));
}

#[test]
fn zero_pattern_weight_removes_the_vote() {
    let (pipeline, _) = run(config(AggregatorConfig {
        indicator_weight: 0.0,
        pattern_weights: IndexMap::from([(PatternType::DoubleTop, 0.0)]),
        ..AggregatorConfig::default()
    }));

    assert_eq!(pipeline.active_signals().len(), 1);
    assert_eq!(pipeline.decision().bias, Bias::Neutral);
    assert_eq!(pipeline.decision().confidence, 0.0);
    assert!(pipeline.decision().contributions.is_empty());
}

use crate::{
    config::PipelineConfig,
    decision::{DecisionState, aggregate},
    error::{ConfigError, DataGapError, PipelineError, PipelineWarning, SnapshotError},
    normalizer::{BarNormalizer, NormalizedBar},
    snapshot::PipelineSnapshot,
};
use intraday_alert::{
    Alert, AlertDispatcher, AlertRequest, AlertSink, DispatchReport, rule::RuleEvaluator,
};
use intraday_instrument::{InstrumentId, PriceBar};
use intraday_ta::{
    IndicatorEngine, IndicatorVector, PatternDetector, PatternSignal, indicator::IndicatorValue,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Everything produced by one accepted bar.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PipelineOutput {
    pub vector: IndicatorVector,
    /// Pattern signals newly emitted on this bar.
    pub signals: Vec<PatternSignal>,
    /// Alerts delivered to the sink on this bar, highest priority first.
    pub alerts: Vec<Alert>,
    /// Data gaps and alert delivery failures. None of these stop the pipeline.
    pub warnings: Vec<PipelineWarning>,
    pub decision: DecisionState,
    /// Flush of the previous session, present on the first bar of a new session.
    pub session_close: Option<DispatchReport>,
}

impl PipelineOutput {
    /// Gap marker attached to this bar, if bars were missing before it.
    pub fn gap(&self) -> Option<&DataGapError> {
        self.warnings.iter().find_map(|warning| match warning {
            PipelineWarning::DataGap(gap) => Some(gap),
            PipelineWarning::AlertDelivery(_) => None,
        })
    }
}

/// Logically single-threaded processing chain of one instrument:
/// Normalizer -> Indicator Engine -> Pattern Detector -> {Alert Dispatcher, Decision Aggregator}.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    instrument: InstrumentId,
    normalizer: BarNormalizer,
    engine: IndicatorEngine,
    detector: PatternDetector,
    rules: RuleEvaluator,
    dispatcher: AlertDispatcher,
    decision: DecisionState,
}

impl Pipeline {
    /// Construct a new [`Pipeline`], validating the [`PipelineConfig`].
    pub fn new(instrument: InstrumentId, config: Arc<PipelineConfig>) -> Result<Self, ConfigError> {
        let engine = IndicatorEngine::new(
            instrument.clone(),
            &config.indicators,
            config.history_capacity,
        )?;
        let detector =
            PatternDetector::new(instrument.clone(), &config.patterns, &config.indicators)?;
        config.alerts.validate(&config.indicators)?;
        config.aggregator.validate()?;
        config.normalizer.validate()?;

        info!(
            %instrument,
            indicators = config.indicators.len(),
            patterns = config.patterns.len(),
            rules = config.alerts.rules.len(),
            "Pipeline constructed"
        );

        Ok(Self {
            normalizer: BarNormalizer::new(instrument.clone(), config.normalizer),
            rules: RuleEvaluator::new(config.alerts.rules.clone()),
            dispatcher: AlertDispatcher::new(&config.alerts),
            decision: DecisionState::neutral(instrument.clone()),
            engine,
            detector,
            instrument,
            config,
        })
    }

    /// Process the next bar of this instrument.
    ///
    /// Rejected bars (malformed, out of order or for another instrument) return an error and
    /// leave the pipeline untouched. The first bar of a new session implicitly closes the
    /// previous one.
    pub fn process<Sink>(
        &mut self,
        bar: &PriceBar,
        sink: &Sink,
    ) -> Result<PipelineOutput, PipelineError>
    where
        Sink: AlertSink + ?Sized,
    {
        let NormalizedBar {
            bar,
            gap,
            session_boundary,
        } = self.normalizer.normalize(bar)?;

        let session_close = session_boundary.then(|| self.session_close(sink));

        let vector = self.engine.ingest(&bar)?;
        let signals = self.detector.step(&bar, &vector);

        let mut warnings = gap
            .into_iter()
            .map(PipelineWarning::from)
            .collect::<Vec<_>>();

        let rule_requests = self.rules.evaluate(&vector);
        let pattern_requests = signals.iter().filter_map(|signal| {
            let severity = self.config.alerts.pattern_severity(signal.confidence)?;
            Some(AlertRequest::from_pattern(signal, severity))
        });

        for request in pattern_requests.chain(rule_requests) {
            if let Err(error) = self.dispatcher.submit(request) {
                warnings.push(PipelineWarning::from(error));
            }
        }

        let report = self.dispatcher.dispatch(sink);
        warnings.extend(report.failures.into_iter().map(PipelineWarning::from));

        self.decision = self.recompute();

        debug!(
            instrument = %self.instrument,
            bar_index = vector.bar_index,
            signals = signals.len(),
            alerts = report.dispatched.len(),
            bias = %self.decision.bias,
            confidence = self.decision.confidence,
            "Pipeline processed bar"
        );

        Ok(PipelineOutput {
            vector,
            signals,
            alerts: report.dispatched,
            warnings,
            decision: self.decision.clone(),
            session_close,
        })
    }

    /// Close the current session: flush pending alerts per the configured
    /// [`FlushPolicy`](intraday_alert::FlushPolicy), reset every pattern automaton and forget
    /// indicator rule history.
    pub fn session_close<Sink>(&mut self, sink: &Sink) -> DispatchReport
    where
        Sink: AlertSink + ?Sized,
    {
        let report = self.dispatcher.flush(self.config.flush_policy, sink);
        self.detector.reset_session();
        self.rules.reset_session();
        self.decision = self.recompute();

        info!(
            instrument = %self.instrument,
            dispatched = report.dispatched.len(),
            discarded = report.discarded.len(),
            "Pipeline closed session"
        );
        report
    }

    /// Weighted decision over the latest [`IndicatorVector`] and the active [`PatternSignal`]s.
    pub fn recompute(&self) -> DecisionState {
        aggregate(
            &self.instrument,
            self.engine.latest(),
            self.detector.active_signals(),
            &self.config.aggregator,
        )
    }

    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    pub fn config(&self) -> &Arc<PipelineConfig> {
        &self.config
    }

    pub fn latest(&self) -> Option<&IndicatorVector> {
        self.engine.latest()
    }

    /// Bounded recent [`IndicatorVector`] history, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &IndicatorVector> {
        self.engine.history()
    }

    pub fn series<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = (u64, IndicatorValue)> + 'a {
        self.engine.series(name)
    }

    pub fn decision(&self) -> &DecisionState {
        &self.decision
    }

    pub fn active_signals(&self) -> &[PatternSignal] {
        self.detector.active_signals()
    }

    /// Alerts awaiting delivery, highest priority first.
    pub fn pending_alerts(&self) -> impl Iterator<Item = &Alert> + '_ {
        self.dispatcher.pending()
    }

    pub fn engine(&self) -> &IndicatorEngine {
        &self.engine
    }

    pub fn detector(&self) -> &PatternDetector {
        &self.detector
    }

    pub fn dispatcher(&self) -> &AlertDispatcher {
        &self.dispatcher
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            instrument: self.instrument.clone(),
            normalizer: self.normalizer.clone(),
            engine: self.engine.clone(),
            detector: self.detector.clone(),
            rules: self.rules.clone(),
            dispatcher: self.dispatcher.clone(),
            decision: self.decision.clone(),
        }
    }

    /// Restore a [`Pipeline`] from a [`PipelineSnapshot`] taken under a compatible
    /// [`PipelineConfig`] (same indicators, patterns and rules).
    pub fn restore(
        config: Arc<PipelineConfig>,
        snapshot: PipelineSnapshot,
    ) -> Result<Self, SnapshotError> {
        config.validate()?;

        let PipelineSnapshot {
            instrument,
            normalizer,
            engine,
            detector,
            rules,
            dispatcher,
            decision,
        } = snapshot;

        for component in [engine.instrument(), detector.instrument(), &decision.instrument] {
            if component != &instrument {
                return Err(SnapshotError::InstrumentMismatch {
                    expected: instrument,
                    received: component.clone(),
                });
            }
        }

        let indicators_match = engine
            .names()
            .eq(config.indicators.iter().map(|spec| &spec.name));
        if !indicators_match {
            return Err(SnapshotError::Incompatible(
                "indicator set differs from configuration".to_string(),
            ));
        }

        let patterns_match = detector
            .pattern_types()
            .eq(config.patterns.iter().map(|spec| spec.pattern_type()));
        if !patterns_match {
            return Err(SnapshotError::Incompatible(
                "pattern set differs from configuration".to_string(),
            ));
        }

        if rules.rules() != config.alerts.rules.as_slice() {
            return Err(SnapshotError::Incompatible(
                "indicator rules differ from configuration".to_string(),
            ));
        }

        info!(
            %instrument,
            bars_accepted = engine.bars_accepted(),
            "Pipeline restored from snapshot"
        );

        Ok(Self {
            config,
            instrument,
            normalizer,
            engine,
            detector,
            rules,
            dispatcher,
            decision,
        })
    }
}

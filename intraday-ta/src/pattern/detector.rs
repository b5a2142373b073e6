use crate::{
    engine::IndicatorVector,
    error::TaConfigError,
    indicator::IndicatorSpec,
    pattern::{
        AnyRecognizer, BarWindow, PatternContext, PatternRecognizer, PatternSignal, PatternSpec,
        PatternType, clamp_confidence,
    },
};
use intraday_instrument::{InstrumentId, PriceBar};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Minimum capacity of the shared session [`BarWindow`].
const MIN_WINDOW_CAPACITY: usize = 2;

/// Recogniser plus the firing bookkeeping of its pattern type.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RecognizerSlot {
    pub spec: PatternSpec,
    pub recognizer: AnyRecognizer,
    pub last_fired_bar: Option<u64>,
    pub last_end_bar: Option<u64>,
}

/// Per-instrument owner of one finite-state recogniser per configured pattern.
///
/// Every accepted bar steps each recogniser whose history requirement is met, then applies:
/// * **Cool-down**: a pattern type that fired at bar `b` cannot fire again at bars
///   `b+1..=b+cooldown_bars`.
/// * **Non-overlap**: a signal whose `start_bar` is not strictly after the previous signal's
///   `end_bar` of the same pattern type is discarded.
/// * **Validity**: emitted signals stay active until `end_bar + valid_for_bars`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PatternDetector {
    instrument: InstrumentId,
    window: BarWindow,
    slots: Vec<RecognizerSlot>,
    active: Vec<PatternSignal>,
}

impl PatternDetector {
    /// Construct a new detector, validating every [`PatternSpec`] against the configured
    /// indicators. Each pattern type may be configured at most once.
    pub fn new(
        instrument: InstrumentId,
        specs: &[PatternSpec],
        indicators: &[IndicatorSpec],
    ) -> Result<Self, TaConfigError> {
        let mut slots: Vec<RecognizerSlot> = Vec::with_capacity(specs.len());
        for spec in specs {
            spec.validate(indicators)?;
            let pattern = spec.pattern_type();
            if slots.iter().any(|slot| slot.spec.pattern_type() == pattern) {
                return Err(TaConfigError::InvalidPattern {
                    pattern,
                    reason: "configured more than once".to_string(),
                });
            }
            slots.push(RecognizerSlot {
                spec: spec.clone(),
                recognizer: AnyRecognizer::new(&spec.kind),
                last_fired_bar: None,
                last_end_bar: None,
            });
        }

        let capacity = slots
            .iter()
            .map(|slot| slot.recognizer.min_history())
            .max()
            .unwrap_or_default()
            .max(MIN_WINDOW_CAPACITY);

        Ok(Self {
            instrument,
            window: BarWindow::new(capacity),
            slots,
            active: Vec::new(),
        })
    }

    /// Step every recogniser with the next accepted bar and its [`IndicatorVector`], returning
    /// the newly emitted [`PatternSignal`]s.
    pub fn step(&mut self, bar: &PriceBar, vector: &IndicatorVector) -> Vec<PatternSignal> {
        let bar_index = vector.bar_index;
        self.window.push(bar_index, bar.clone());
        self.active.retain(|signal| signal.is_active(bar_index));

        let context = PatternContext {
            bar_index,
            bar,
            window: &self.window,
            vector,
        };

        let mut emitted = Vec::new();
        for slot in &mut self.slots {
            if self.window.len() < slot.recognizer.min_history() {
                continue;
            }

            let Some(matched) = slot.recognizer.step(&context) else {
                continue;
            };
            let pattern_type = slot.spec.pattern_type();

            if let Some(last_fired) = slot.last_fired_bar {
                if bar_index.saturating_sub(last_fired) <= slot.spec.cooldown_bars {
                    debug!(
                        instrument = %self.instrument,
                        %pattern_type,
                        bar_index,
                        last_fired,
                        "PatternDetector suppressed signal in cool-down"
                    );
                    continue;
                }
            }

            if let Some(last_end) = slot.last_end_bar {
                if matched.start_bar <= last_end {
                    debug!(
                        instrument = %self.instrument,
                        %pattern_type,
                        start_bar = matched.start_bar,
                        last_end,
                        "PatternDetector discarded overlapping signal"
                    );
                    continue;
                }
            }

            let signal = PatternSignal {
                instrument: self.instrument.clone(),
                pattern_type,
                start_bar: matched.start_bar,
                end_bar: matched.end_bar,
                confidence: clamp_confidence(matched.confidence),
                detected_at: bar.time,
                valid_until_bar: matched.end_bar.saturating_add(slot.spec.valid_for_bars),
            };

            debug!(
                instrument = %self.instrument,
                %pattern_type,
                start_bar = signal.start_bar,
                end_bar = signal.end_bar,
                confidence = signal.confidence,
                "PatternDetector emitted signal"
            );

            slot.last_fired_bar = Some(bar_index);
            slot.last_end_bar = Some(signal.end_bar);
            self.active.push(signal.clone());
            emitted.push(signal);
        }

        emitted
    }

    /// Return every automaton to its initial state and clear the session window, cool-downs and
    /// active signals.
    pub fn reset_session(&mut self) {
        self.window.clear();
        self.active.clear();
        for slot in &mut self.slots {
            slot.recognizer.reset();
            slot.last_fired_bar = None;
            slot.last_end_bar = None;
        }
        info!(instrument = %self.instrument, "PatternDetector session reset");
    }

    /// Signals whose validity window includes the most recent bar.
    pub fn active_signals(&self) -> &[PatternSignal] {
        &self.active
    }

    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    pub fn pattern_types(&self) -> impl Iterator<Item = PatternType> + '_ {
        self.slots.iter().map(|slot| slot.spec.pattern_type())
    }

    pub fn slots(&self) -> &[RecognizerSlot] {
        &self.slots
    }
}

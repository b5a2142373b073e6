use crate::{decision::AggregatorConfig, error::ConfigError, normalizer::NormalizerConfig};
use fnv::FnvHashMap;
use indexmap::IndexMap;
use intraday_alert::{AlertConfig, FlushPolicy};
use intraday_instrument::InstrumentId;
use intraday_ta::{
    IndicatorEngine, IndicatorSpec, PatternDetector, PatternSpec,
    engine::DEFAULT_HISTORY_CAPACITY,
    indicator::IndicatorKind,
    pattern::{
        PatternKind,
        breakout::BreakoutTemplate,
        candle::{DojiTemplate, EngulfingTemplate, HammerTemplate},
        crossover::CrossoverTemplate,
        double::DoubleExtremeTemplate,
    },
};
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc};

/// Default capacity of every per-instrument bar queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Top-level configuration of a sharded Intraday system.
///
/// Every instrument pipeline is built from an immutable [`PipelineConfig`]: the instrument's
/// entry in `instruments` if present, otherwise the shared `pipeline` default.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct SystemConfig {
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub instruments: IndexMap<InstrumentId, PipelineConfig>,
    #[serde(default)]
    pub queue: QueueConfig,
}

impl SystemConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config = serde_json::from_str::<Self>(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_path<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// [`PipelineConfig`] used for the provided instrument.
    pub fn pipeline_config(&self, instrument: &InstrumentId) -> &PipelineConfig {
        self.instruments.get(instrument).unwrap_or(&self.pipeline)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        self.instruments
            .values()
            .try_for_each(PipelineConfig::validate)?;
        self.queue.validate()
    }
}

/// Immutable [`PipelineConfig`]s shared by every pipeline, resolved per instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfigs {
    default: Arc<PipelineConfig>,
    instruments: FnvHashMap<InstrumentId, Arc<PipelineConfig>>,
}

impl PipelineConfigs {
    pub fn get(&self, instrument: &InstrumentId) -> Arc<PipelineConfig> {
        self.instruments
            .get(instrument)
            .unwrap_or(&self.default)
            .clone()
    }
}

impl From<&SystemConfig> for PipelineConfigs {
    fn from(value: &SystemConfig) -> Self {
        Self {
            default: Arc::new(value.pipeline.clone()),
            instruments: value
                .instruments
                .iter()
                .map(|(instrument, config)| (instrument.clone(), Arc::new(config.clone())))
                .collect(),
        }
    }
}

/// Configuration of one instrument pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub indicators: Vec<IndicatorSpec>,
    #[serde(default)]
    pub patterns: Vec<PatternSpec>,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    /// Recent [`IndicatorVector`](intraday_ta::IndicatorVector)s retained for queries.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Treatment of pending alerts at session close.
    #[serde(default)]
    pub flush_policy: FlushPolicy,
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

impl Default for PipelineConfig {
    /// Indicator and candlestick set of the original dashboard, plus breakout, double top/bottom
    /// and MACD crossover recognisers with their default templates.
    fn default() -> Self {
        let indicators = vec![
            IndicatorSpec::new("ema_20", IndicatorKind::Ema { period: 20 }),
            IndicatorSpec::new("rsi_14", IndicatorKind::Rsi { period: 14 }),
            IndicatorSpec::new(
                "macd",
                IndicatorKind::Macd {
                    fast: 12,
                    slow: 26,
                    signal: 9,
                },
            ),
            IndicatorSpec::new(
                "bollinger_20",
                IndicatorKind::Bollinger {
                    period: 20,
                    std_dev: 2.0,
                },
            ),
            IndicatorSpec::new("vwap_20", IndicatorKind::Vwap { period: 20 }),
            IndicatorSpec::new("atr_14", IndicatorKind::Atr { period: 14 }),
        ];

        let patterns = [
            PatternKind::Doji(DojiTemplate::default()),
            PatternKind::Hammer(HammerTemplate::default()),
            PatternKind::BullishEngulfing(EngulfingTemplate::default()),
            PatternKind::BearishEngulfing(EngulfingTemplate::default()),
            PatternKind::BullishBreakout(BreakoutTemplate::default()),
            PatternKind::BearishBreakout(BreakoutTemplate::default()),
            PatternKind::DoubleTop(DoubleExtremeTemplate::default()),
            PatternKind::DoubleBottom(DoubleExtremeTemplate::default()),
            PatternKind::MacdBullishCrossover(CrossoverTemplate::new("macd")),
            PatternKind::MacdBearishCrossover(CrossoverTemplate::new("macd")),
        ]
        .into_iter()
        .map(PatternSpec::new)
        .collect();

        Self {
            indicators,
            patterns,
            alerts: AlertConfig::default(),
            aggregator: AggregatorConfig::default(),
            normalizer: NormalizerConfig::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            flush_policy: FlushPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate every section, including indicator and pattern construction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        IndicatorEngine::new(
            InstrumentId::default(),
            &self.indicators,
            self.history_capacity,
        )?;
        PatternDetector::new(InstrumentId::default(), &self.patterns, &self.indicators)?;
        self.alerts.validate(&self.indicators)?;
        self.aggregator.validate()?;
        self.normalizer.validate()
    }
}

/// Behaviour of a full bar queue.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Producer waits for space.
    #[default]
    Block,
    /// Oldest queued bar is dropped and a data gap reported.
    DropOldest,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    pub capacity: usize,
    pub policy: BackpressurePolicy,
    /// Upper bound on how long a blocked producer waits.
    pub send_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            policy: BackpressurePolicy::default(),
            send_timeout_ms: 5_000,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            Err(ConfigError::ZeroQueueCapacity)
        } else if self.send_timeout_ms == 0 {
            Err(ConfigError::ZeroSendTimeout)
        } else {
            Ok(())
        }
    }
}

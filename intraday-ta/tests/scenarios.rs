use intraday_instrument::{
    InstrumentId, PriceBar,
    test_utils::{bar, bars_from_closes, flat_bar, session_open, time_plus_mins},
};
use intraday_ta::{
    IndicatorEngine, IndicatorSpec, IndicatorValue, PatternDetector, PatternSignal, PatternSpec,
    PatternType,
    error::IndicatorError,
    indicator::IndicatorKind,
    pattern::{
        PatternKind,
        breakout::BreakoutTemplate,
        candle::{DojiTemplate, EngulfingTemplate, HammerTemplate},
        crossover::CrossoverTemplate,
        double::DoubleExtremeTemplate,
    },
};
use proptest::prelude::*;
use std::collections::HashMap;

fn indicators() -> Vec<IndicatorSpec> {
    vec![
        IndicatorSpec::new("rsi_14", IndicatorKind::Rsi { period: 14 }),
        IndicatorSpec::new("sma_10", IndicatorKind::Sma { period: 10 }),
        IndicatorSpec::new(
            "macd",
            IndicatorKind::Macd {
                fast: 12,
                slow: 26,
                signal: 9,
            },
        ),
    ]
}

fn patterns(cooldown_bars: u64) -> Vec<PatternSpec> {
    let breakout = BreakoutTemplate {
        lookback: 10,
        volume_multiplier: 1.2,
        confirmation_bars: 1,
    };
    let double = DoubleExtremeTemplate {
        swing: 1,
        tolerance: 0.01,
        min_separation: 2,
        max_span: 30,
        min_retracement: 0.002,
    };

    vec![
        PatternKind::Doji(DojiTemplate::default()),
        PatternKind::Hammer(HammerTemplate::default()),
        PatternKind::BullishEngulfing(EngulfingTemplate::default()),
        PatternKind::BearishEngulfing(EngulfingTemplate::default()),
        PatternKind::BullishBreakout(breakout),
        PatternKind::BearishBreakout(breakout),
        PatternKind::DoubleTop(double),
        PatternKind::DoubleBottom(double),
        PatternKind::MacdBullishCrossover(CrossoverTemplate::new("macd")),
        PatternKind::MacdBearishCrossover(CrossoverTemplate::new("macd")),
    ]
    .into_iter()
    .map(|kind| PatternSpec::new(kind).with_cooldown(cooldown_bars))
    .collect()
}

fn run(bars: &[PriceBar], cooldown_bars: u64) -> Vec<(u64, PatternSignal)> {
    let instrument = InstrumentId::new("X");
    let mut engine = IndicatorEngine::new(instrument.clone(), &indicators(), 100).unwrap();
    let mut detector =
        PatternDetector::new(instrument, &patterns(cooldown_bars), &indicators()).unwrap();

    bars.iter()
        .flat_map(|bar| {
            let vector = engine.ingest(bar).unwrap();
            let bar_index = vector.bar_index;
            detector
                .step(bar, &vector)
                .into_iter()
                .map(move |signal| (bar_index, signal))
                .collect::<Vec<_>>()
        })
        .collect()
}

fn random_bars(steps: &[(f64, f64, f64, f64, f64)]) -> Vec<PriceBar> {
    let mut close = 100.0;
    steps
        .iter()
        .enumerate()
        .map(|(index, &(open_gap, change, upper, lower, volume))| {
            let open = close + open_gap;
            close = open + change;
            bar(
                "X",
                time_plus_mins(session_open(), index as i64),
                open,
                open.max(close) + upper,
                open.min(close) - lower,
                close,
                volume,
            )
        })
        .collect()
}

proptest! {
    #[test]
    fn signals_respect_bounds_overlap_and_cooldown(
        steps in prop::collection::vec(
            (-0.2f64..0.2, -1.0f64..1.0, 0.0f64..0.8, 0.0f64..0.8, 10.0f64..1_000.0),
            1..150,
        ),
        cooldown_bars in 0u64..6,
    ) {
        let bars = random_bars(&steps);
        let signals = run(&bars, cooldown_bars);

        let mut last: HashMap<PatternType, (u64, u64)> = HashMap::new();
        for (fired_at, signal) in &signals {
            prop_assert!((0.0..=1.0).contains(&signal.confidence));
            prop_assert!(signal.start_bar <= signal.end_bar);
            prop_assert!(signal.end_bar <= *fired_at);
            prop_assert_eq!(signal.detected_at, bars[*fired_at as usize].time);

            if let Some((last_fired, last_end)) = last.get(&signal.pattern_type) {
                prop_assert!(signal.start_bar > *last_end, "{:?} overlaps", signal);
                prop_assert!(fired_at - last_fired > cooldown_bars, "{:?} in cool-down", signal);
            }
            last.insert(signal.pattern_type, (*fired_at, signal.end_bar));
        }
    }
}

#[test]
fn flat_market_is_neutral_and_quiet() {
    let bars = (0..50)
        .map(|index| flat_bar("X", index, 100.0, 1_000.0))
        .collect::<Vec<_>>();

    let instrument = InstrumentId::new("X");
    let mut engine = IndicatorEngine::new(instrument.clone(), &indicators(), 100).unwrap();
    let specs = patterns(5)
        .into_iter()
        .filter(|spec| spec.pattern_type() != PatternType::Doji)
        .collect::<Vec<_>>();
    let mut detector = PatternDetector::new(instrument, &specs, &indicators()).unwrap();

    for bar in &bars {
        let vector = engine.ingest(bar).unwrap();
        let signals = detector.step(bar, &vector);
        assert!(signals.is_empty(), "unexpected signals {signals:?}");
    }

    let latest = engine.latest().unwrap();
    assert_eq!(latest.value("rsi_14"), Some(IndicatorValue::Single(50.0)));
    assert_eq!(latest.value("sma_10"), Some(IndicatorValue::Single(100.0)));
}

#[test]
fn out_of_order_bar_leaves_series_unchanged() {
    let bars = bars_from_closes("X", &[10.0, 11.0, 12.0, 11.5, 12.5], 0.2);
    let mut engine = IndicatorEngine::new(InstrumentId::new("X"), &indicators(), 100).unwrap();

    for bar in &bars[..4] {
        engine.ingest(bar).unwrap();
    }
    let before = engine.clone();

    struct TestCase {
        input: PriceBar,
    }

    let cases = vec![
        // TC0: timestamp equal to the last accepted bar
        TestCase {
            input: bars[3].clone(),
        },
        // TC1: timestamp earlier than the last accepted bar
        TestCase {
            input: PriceBar {
                close: 99.0,
                ..bars[1].clone()
            },
        },
    ];

    for (index, test) in cases.into_iter().enumerate() {
        let actual = engine.ingest(&test.input);
        assert!(
            matches!(actual, Err(IndicatorError::OutOfOrder(_))),
            "TC{index} failed"
        );
        assert_eq!(engine, before, "TC{index} failed");
    }

    let vector = engine.ingest(&bars[4]).unwrap();
    assert_eq!(vector.bar_index, 4);
    assert_eq!(engine.series("sma_10").count(), 5);
}

#[test]
fn double_top_reaches_detector_output() {
    // Rally, first peak, pullback, second peak, neckline break
    let closes = [
        100.0, 101.0, 102.0, 103.0, 104.0, 105.0, 103.0, 101.5, 103.0, 104.9, 103.0, 101.0, 99.0,
        98.0,
    ];
    let bars = bars_from_closes("X", &closes, 0.0);
    let signals = run(&bars, 0);

    let double_tops = signals
        .iter()
        .filter(|(_, signal)| signal.pattern_type == PatternType::DoubleTop)
        .collect::<Vec<_>>();
    assert_eq!(double_tops.len(), 1, "{signals:?}");
    let (_, signal) = double_tops[0];
    assert_eq!(signal.start_bar, 5);
    assert!(signal.confidence > 0.5);
}

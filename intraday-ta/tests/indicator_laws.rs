use intraday_instrument::{
    InstrumentId, PriceBar,
    test_utils::{bar, session_open, time_plus_mins},
};
use intraday_ta::{
    IndicatorEngine, IndicatorSpec, IndicatorValue,
    batch::recompute,
    indicator::{IndicatorKind, UndefinedReason},
};
use proptest::prelude::*;

const INSUFFICIENT: IndicatorValue = IndicatorValue::Undefined(UndefinedReason::InsufficientHistory);

fn kinds() -> Vec<IndicatorKind> {
    vec![
        IndicatorKind::Sma { period: 5 },
        IndicatorKind::Ema { period: 8 },
        IndicatorKind::Rsi { period: 6 },
        IndicatorKind::Macd {
            fast: 3,
            slow: 7,
            signal: 4,
        },
        IndicatorKind::Bollinger {
            period: 6,
            std_dev: 2.0,
        },
        IndicatorKind::Vwap { period: 4 },
        IndicatorKind::Atr { period: 5 },
    ]
}

fn specs() -> Vec<IndicatorSpec> {
    kinds()
        .into_iter()
        .enumerate()
        .map(|(index, kind)| IndicatorSpec::new(format!("indicator_{index}").as_str(), kind))
        .collect()
}

/// Random walk bars: `(close change, upper wick, lower wick, volume)` per bar.
fn random_walk(steps: &[(f64, f64, f64, f64)]) -> Vec<PriceBar> {
    let mut close = 100.0;
    steps
        .iter()
        .enumerate()
        .map(|(index, &(change, upper, lower, volume))| {
            let open = close;
            close += change;
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

fn steps_strategy() -> impl Strategy<Value = Vec<(f64, f64, f64, f64)>> {
    prop::collection::vec(
        (-0.5f64..0.5, 0.0f64..0.3, 0.0f64..0.3, 1.0f64..1_000.0),
        1..120,
    )
}

fn approx_eq(actual: &IndicatorValue, expected: &IndicatorValue) -> bool {
    match actual.max_abs_diff(expected) {
        Some(diff) => diff <= 1e-6,
        None => false,
    }
}

proptest! {
    #[test]
    fn incremental_equals_full_recomputation(steps in steps_strategy()) {
        let bars = random_walk(&steps);
        let mut engine = IndicatorEngine::new(InstrumentId::new("X"), &specs(), bars.len()).unwrap();
        let vectors = bars
            .iter()
            .map(|bar| engine.ingest(bar).unwrap())
            .collect::<Vec<_>>();

        for spec in specs() {
            let batch = recompute(&spec.kind, &bars);
            for (vector, expected) in vectors.iter().zip(batch.iter()) {
                let actual = vector.value(spec.name.as_str()).unwrap();
                prop_assert!(
                    approx_eq(&actual, expected),
                    "{} at bar {}: incremental {:?} != batch {:?}",
                    spec.name,
                    vector.bar_index,
                    actual,
                    expected
                );
            }
        }
    }

    #[test]
    fn value_undefined_exactly_until_warm_up(steps in steps_strategy()) {
        let bars = random_walk(&steps);
        let mut engine = IndicatorEngine::new(InstrumentId::new("X"), &specs(), 10).unwrap();

        for (index, bar) in bars.iter().enumerate() {
            let vector = engine.ingest(bar).unwrap();
            for spec in specs() {
                let value = vector.value(spec.name.as_str()).unwrap();
                let warm = index + 1 >= spec.kind.warm_up();
                prop_assert_eq!(
                    value != INSUFFICIENT,
                    warm,
                    "{} at bar {} with warm-up {}",
                    spec.name,
                    index,
                    spec.kind.warm_up()
                );
            }
        }
    }

    #[test]
    fn vectors_align_with_accepted_bars(
        steps in steps_strategy(),
        replays in prop::collection::vec(any::<prop::sample::Index>(), 0..10),
    ) {
        let bars = random_walk(&steps);
        let mut engine = IndicatorEngine::new(InstrumentId::new("X"), &specs(), 1_000).unwrap();
        let mut accepted = Vec::new();

        for (index, bar) in bars.iter().enumerate() {
            // Interleave stale bars, which must all be rejected
            for replay in &replays {
                if index > 0 {
                    let stale = &bars[replay.index(index)];
                    prop_assert!(engine.ingest(stale).is_err());
                }
            }
            engine.ingest(bar).unwrap();
            accepted.push(bar.time);
        }

        let times = engine.history().map(|vector| vector.time).collect::<Vec<_>>();
        prop_assert_eq!(times, accepted);
        prop_assert!(
            engine
                .history()
                .enumerate()
                .all(|(index, vector)| vector.bar_index == index as u64)
        );
    }
}

#[test]
fn ema_and_sma_match_ta_reference() {
    use ta::{
        Next,
        indicators::{ExponentialMovingAverage, SimpleMovingAverage},
    };

    let closes = (0..200)
        .map(|index| 100.0 + (index as f64 * 0.37).sin() * 5.0 + index as f64 * 0.01)
        .collect::<Vec<_>>();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(index, &close)| {
            bar(
                "X",
                time_plus_mins(session_open(), index as i64),
                close,
                close + 0.5,
                close - 0.5,
                close,
                100.0,
            )
        })
        .collect::<Vec<_>>();

    let specs = vec![
        IndicatorSpec::new("ema_20", IndicatorKind::Ema { period: 20 }),
        IndicatorSpec::new("sma_20", IndicatorKind::Sma { period: 20 }),
    ];
    let mut engine = IndicatorEngine::new(InstrumentId::new("X"), &specs, 10).unwrap();
    let mut reference_ema = ExponentialMovingAverage::new(20).unwrap();
    let mut reference_sma = SimpleMovingAverage::new(20).unwrap();

    for (index, bar) in bars.iter().enumerate() {
        let vector = engine.ingest(bar).unwrap();
        let expected_ema = reference_ema.next(bar.close);
        let expected_sma = reference_sma.next(bar.close);

        if index + 1 < 20 {
            continue;
        }

        let Some(IndicatorValue::Single(ema)) = vector.value("ema_20") else {
            panic!("ema undefined at bar {index}");
        };
        let Some(IndicatorValue::Single(sma)) = vector.value("sma_20") else {
            panic!("sma undefined at bar {index}");
        };
        assert!((ema - expected_ema).abs() < 1e-9, "ema at bar {index}");
        assert!((sma - expected_sma).abs() < 1e-9, "sma at bar {index}");
    }
}

use intraday::{
    PipelineConfig, PipelineTable, SystemConfig, SystemHandle,
    config::{BackpressurePolicy, QueueConfig},
    system::SystemEvent,
};
use intraday_alert::VecAlertSink;
use intraday_instrument::{
    InstrumentId, PriceBar,
    test_utils::{bar, bars_from_closes, session_open},
};
use intraday_ta::{
    IndicatorSpec, PatternSpec,
    indicator::IndicatorKind,
    pattern::{PatternKind, candle::DojiTemplate},
};
use std::sync::Arc;
use tokio::sync::mpsc;

fn interleaved(closes: &[f64], instruments: &[&str]) -> Vec<PriceBar> {
    let per_instrument = instruments
        .iter()
        .enumerate()
        .map(|(offset, instrument)| {
            let closes = closes
                .iter()
                .map(|close| close + offset as f64 * 10.0)
                .collect::<Vec<_>>();
            bars_from_closes(instrument, &closes, 0.3)
        })
        .collect::<Vec<_>>();

    (0..closes.len())
        .flat_map(|index| per_instrument.iter().map(move |bars| bars[index].clone()))
        .collect()
}

fn closes() -> Vec<f64> {
    (0..60)
        .map(|index| 100.0 + (index as f64 / 5.0).sin() * 4.0 + index as f64 * 0.05)
        .collect()
}

fn drain(mut rx: mpsc::UnboundedReceiver<SystemEvent>) -> Vec<SystemEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn system_matches_synchronous_replay() {
    let config = SystemConfig::default();
    let bars = interleaved(&closes(), &["RELIANCE.NS", "INFY.NS"]);
    let (before_close, after_close) = bars.split_at(70);

    // Synchronous reference
    let table_sink = VecAlertSink::default();
    let mut table = PipelineTable::new(&config).unwrap();
    for bar in before_close {
        table.process(bar, &table_sink).unwrap();
    }
    table.session_close_all(&table_sink);
    for bar in after_close {
        table.process(bar, &table_sink).unwrap();
    }

    let sink = Arc::new(VecAlertSink::default());
    let (mut system, rx) = SystemHandle::start(&config, sink.clone()).unwrap();
    let view = system.view().clone();

    for bar in before_close {
        system.send(bar.clone()).await.unwrap();
    }
    system.session_close().unwrap();
    for bar in after_close {
        system.send(bar.clone()).await.unwrap();
    }

    let snapshot = system.shutdown().await.unwrap();
    assert_eq!(snapshot, table.snapshot());
    assert_eq!(sink.len(), table_sink.len());

    let events = drain(rx);
    let processed = events
        .iter()
        .filter(|event| matches!(event, SystemEvent::Processed(_)))
        .count();
    let closed = events
        .iter()
        .filter(|event| matches!(event, SystemEvent::SessionClosed { .. }))
        .count();
    assert_eq!(processed, bars.len());
    assert_eq!(closed, 2);

    let reliance = InstrumentId::new("RELIANCE.NS");
    assert_eq!(
        view.instruments(),
        vec![InstrumentId::new("INFY.NS"), reliance.clone()]
    );
    assert_eq!(
        view.latest(&reliance).map(|vector| vector.bar_index),
        Some(59)
    );
    assert_eq!(view.history(&reliance).len(), 60);
    assert_eq!(
        view.decision(&reliance).as_ref(),
        table.get(&reliance).map(|pipeline| pipeline.decision())
    );
    assert_eq!(
        view.active_signals(&reliance),
        table.get(&reliance).unwrap().active_signals()
    );
}

#[tokio::test]
async fn drop_oldest_reports_data_gap() {
    let config = SystemConfig {
        queue: QueueConfig {
            capacity: 2,
            policy: BackpressurePolicy::DropOldest,
            send_timeout_ms: 5_000,
        },
        ..SystemConfig::default()
    };
    let bars = bars_from_closes("X", &[10.0, 10.5, 11.0, 10.8, 11.2], 0.1);

    let (mut system, rx) = SystemHandle::start(&config, Arc::new(VecAlertSink::default())).unwrap();

    // Current-thread runtime: the consumer task only runs once the producer yields
    for bar in &bars {
        system.send(bar.clone()).await.unwrap();
    }
    let snapshot = system.shutdown().await.unwrap();

    assert_eq!(snapshot.pipelines[0].engine.bars_accepted(), 2);

    let gaps = drain(rx)
        .into_iter()
        .map(|event| match event {
            SystemEvent::Processed(output) => output.gap().map(|gap| gap.missing_bars),
            other => panic!("unexpected event: {other:?}"),
        })
        .collect::<Vec<_>>();
    assert_eq!(gaps, vec![Some(3), None]);
}

#[tokio::test]
async fn restored_system_continues_where_it_left_off() {
    let config = SystemConfig::default();
    let bars = interleaved(&closes(), &["A", "B", "C"]);
    let (first, rest) = bars.split_at(100);

    let mut table = PipelineTable::new(&config).unwrap();
    let table_sink = VecAlertSink::default();
    for bar in &bars {
        table.process(bar, &table_sink).unwrap();
    }

    let (mut system, _) = SystemHandle::start(&config, Arc::new(VecAlertSink::default())).unwrap();
    for bar in first {
        system.send(bar.clone()).await.unwrap();
    }
    let snapshot = system.shutdown().await.unwrap();

    let (mut system, _) =
        SystemHandle::restore(&config, snapshot, Arc::new(VecAlertSink::default())).unwrap();
    assert_eq!(system.view().instruments().len(), 3);
    for bar in rest {
        system.send(bar.clone()).await.unwrap();
    }

    assert_eq!(system.shutdown().await.unwrap(), table.snapshot());
}

#[tokio::test]
async fn rejected_bars_do_not_stop_the_instrument() {
    let config = SystemConfig::default();
    let bars = bars_from_closes("X", &[10.0, 10.5, 11.0], 0.1);

    let (mut system, rx) = SystemHandle::start(&config, Arc::new(VecAlertSink::default())).unwrap();
    system.send(bars[1].clone()).await.unwrap();
    system.send(bars[0].clone()).await.unwrap();
    system.send(bars[2].clone()).await.unwrap();
    let snapshot = system.shutdown().await.unwrap();

    assert_eq!(snapshot.pipelines[0].engine.bars_accepted(), 2);

    let rejected = drain(rx)
        .into_iter()
        .filter(|event| matches!(event, SystemEvent::Rejected { .. }))
        .count();
    assert_eq!(rejected, 1);
}

#[tokio::test]
async fn session_close_reaches_idle_restored_pipelines() {
    let config = SystemConfig {
        pipeline: PipelineConfig {
            indicators: vec![IndicatorSpec::new("sma_3", IndicatorKind::Sma { period: 3 })],
            patterns: vec![
                PatternSpec::new(PatternKind::Doji(DojiTemplate::default()))
                    .with_cooldown(2)
                    .with_validity(5),
            ],
            ..PipelineConfig::default()
        },
        ..SystemConfig::default()
    };
    let instrument = InstrumentId::new("X");
    let doji = bar("X", session_open(), 10.0, 11.0, 9.0, 10.0, 100.0);

    let mut table = PipelineTable::new(&config).unwrap();
    let table_sink = VecAlertSink::default();
    table.process(&doji, &table_sink).unwrap();
    let snapshot = table.snapshot();
    table.session_close_all(&table_sink);

    let (system, rx) =
        SystemHandle::restore(&config, snapshot, Arc::new(VecAlertSink::default())).unwrap();
    assert_eq!(system.view().active_signals(&instrument).len(), 1);

    // No bar arrives before market close
    system.session_close().unwrap();
    assert!(system.view().active_signals(&instrument).is_empty());
    assert_eq!(
        system
            .view()
            .with_pipeline(&instrument, |pipeline| pipeline.detector().clone()),
        table.get(&instrument).map(|pipeline| pipeline.detector().clone())
    );

    assert_eq!(system.shutdown().await.unwrap(), table.snapshot());

    let closed = drain(rx)
        .into_iter()
        .filter(|event| matches!(event, SystemEvent::SessionClosed { .. }))
        .count();
    assert_eq!(closed, 1);
}

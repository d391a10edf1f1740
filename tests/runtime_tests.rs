use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use uuid::Uuid;

use volume_scanner::engine::AlertEngine;
use volume_scanner::error::SinkError;
use volume_scanner::model::alert::{Alert, AlertKind};
use volume_scanner::model::tick::Tick;
use volume_scanner::runtime::{process_tick, run_engine, run_sink_dispatcher};
use volume_scanner::sink::{AlertSink, CompositeSink};

const WAIT: Duration = Duration::from_secs(5);

/// Counts writes and fails the first `fail_first` of them.
#[derive(Default)]
struct CountingSink {
    calls: AtomicUsize,
    fail_first: usize,
}

impl CountingSink {
    fn failing(fail_first: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_first,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AlertSink for CountingSink {
    fn name(&self) -> &str {
        "counting"
    }

    async fn record(&self, _alert: &Alert) -> Result<(), SinkError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first {
            return Err(SinkError::Rejected {
                service: "counting",
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}

fn sample_alert(symbol: &str) -> Alert {
    Alert {
        id: Uuid::new_v4(),
        symbol: symbol.to_string(),
        price: 10.0,
        change_percent: 0.0,
        relative_volume: 2.0,
        kind: AlertKind::VolumeSpike,
        created_at: Utc::now(),
    }
}

#[tokio::test]
/// Verifies sink failures are counted and logged while later alerts still go through.
async fn dispatcher_continues_after_sink_failure() {
    let sink = Arc::new(CountingSink::failing(2));
    let (alert_tx, alert_rx) = mpsc::channel(8);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    for symbol in ["A", "B", "C", "D"] {
        alert_tx.send(sample_alert(symbol)).await.unwrap();
    }
    drop(alert_tx);

    let stats = timeout(WAIT, run_sink_dispatcher(sink.clone(), alert_rx, shutdown_rx))
        .await
        .expect("dispatcher should drain and stop");
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.delivered, 2);
    assert_eq!(sink.calls(), 4);
}

#[tokio::test]
/// Verifies the engine loop applies ticks in order and forwards alerts, ending
/// cleanly once the tick stream closes.
async fn engine_loop_forwards_alerts_in_order() {
    let (tick_tx, tick_rx) = mpsc::channel(32);
    let (alert_tx, mut alert_rx) = mpsc::channel(32);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    for _ in 0..5 {
        tick_tx.send(Tick::new("BTC-USD", 100.0, 1.0, 0.0)).await.unwrap();
    }
    tick_tx.send(Tick::new("BTC-USD", 100.0, 4.0, 0.0)).await.unwrap();
    tick_tx.send(Tick::new("BTC-USD", 105.0, 1.0, 0.5)).await.unwrap();
    drop(tick_tx);

    let stats = timeout(
        WAIT,
        run_engine(AlertEngine::default(), tick_rx, alert_tx, false, shutdown_rx),
    )
    .await
    .expect("engine should stop when ticks end");
    assert_eq!(stats.ticks, 7);
    assert_eq!(stats.alerts, 2);
    assert_eq!(stats.alerts_dropped, 0);

    let spike = alert_rx.recv().await.unwrap();
    assert_eq!(spike.kind, AlertKind::VolumeSpike);
    assert_eq!(spike.relative_volume, 4.0);
    let high = alert_rx.recv().await.unwrap();
    assert_eq!(high.kind, AlertKind::NewHigh);
    assert_eq!(high.change_percent, 0.5);
}

#[tokio::test]
/// Verifies a stalled sink never blocks ingestion: alerts beyond the channel
/// capacity are dropped and every tick is still applied.
async fn full_alert_channel_drops_instead_of_blocking() {
    let (tick_tx, tick_rx) = mpsc::channel(64);
    let (alert_tx, _alert_rx) = mpsc::channel(1);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    tick_tx.send(Tick::new("ETH-USD", 1.0, 1.0, 0.0)).await.unwrap();
    for i in 1..=10 {
        tick_tx
            .send(Tick::new("ETH-USD", 1.0 + i as f64, 1.0, 0.0))
            .await
            .unwrap();
    }
    drop(tick_tx);

    let stats = timeout(
        WAIT,
        run_engine(AlertEngine::default(), tick_rx, alert_tx, false, shutdown_rx),
    )
    .await
    .unwrap();
    assert_eq!(stats.ticks, 11);
    assert_eq!(stats.alerts, 10);
    assert_eq!(stats.alerts_dropped, 9);
}

#[tokio::test]
/// Verifies shutdown stops the engine loop even while the tick sender is alive.
async fn engine_loop_stops_on_shutdown() {
    let (_tick_tx, tick_rx) = mpsc::channel::<Tick>(4);
    let (alert_tx, _alert_rx) = mpsc::channel(4);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(run_engine(
        AlertEngine::default(),
        tick_rx,
        alert_tx,
        true,
        shutdown_rx,
    ));
    shutdown_tx.send(true).unwrap();
    let stats = timeout(WAIT, handle).await.unwrap().unwrap();
    assert_eq!(stats.ticks, 0);
}

#[test]
/// Verifies the per-tick boundary returns the engine's decision unchanged.
fn process_tick_passes_through_result() {
    let mut engine = AlertEngine::default();
    let now = Utc::now();
    assert_eq!(
        process_tick(&mut engine, &Tick::new("X", 1.0, 1.0, 0.0), now),
        Ok(None)
    );
    let alert = process_tick(&mut engine, &Tick::new("X", 2.0, 1.0, 0.0), now)
        .unwrap()
        .expect("new high");
    assert_eq!(alert.created_at, now);
}

#[test]
/// Verifies composite ordering: a failed persistence write short-circuits the
/// notification step.
fn composite_stops_at_first_failure() {
    let store = Arc::new(CountingSink::failing(1));
    let notifier = Arc::new(CountingSink::default());
    let sinks: Vec<Box<dyn AlertSink>> = vec![Box::new(store.clone()), Box::new(notifier.clone())];
    let composite = CompositeSink::new(sinks);

    assert!(tokio_test::block_on(composite.record(&sample_alert("A"))).is_err());
    assert_eq!(notifier.calls(), 0);

    assert!(tokio_test::block_on(composite.record(&sample_alert("B"))).is_ok());
    assert_eq!(store.calls(), 2);
    assert_eq!(notifier.calls(), 1);
    assert_eq!(composite.names(), vec!["counting", "counting"]);
}

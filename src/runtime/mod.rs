//! Task bodies wired together by the binary: a single-consumer engine loop and
//! the sink dispatcher behind it.

use chrono::{DateTime, NaiveDate, Utc};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

use crate::engine::AlertEngine;
use crate::model::alert::Alert;
use crate::model::tick::Tick;
use crate::sink::AlertSink;

pub mod signal;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub ticks: u64,
    pub alerts: u64,
    pub alerts_dropped: u64,
    pub ticks_failed: u64,
    pub resets: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: u64,
    pub failed: u64,
}

/// Detects the UTC date changing between ticks.
#[derive(Debug, Clone, Default)]
pub struct DailyRollover {
    day: Option<NaiveDate>,
}

impl DailyRollover {
    /// True when `now` falls on a later UTC day than the previous call.
    pub fn crossed(&mut self, now: DateTime<Utc>) -> bool {
        let today = now.date_naive();
        match self.day.replace(today) {
            Some(prev) => today > prev,
            None => false,
        }
    }
}

/// A tick whose processing panicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickFailed;

/// Apply one tick, containing any panic so a single bad tick cannot end the stream.
pub fn process_tick(
    engine: &mut AlertEngine,
    tick: &Tick,
    now: DateTime<Utc>,
) -> Result<Option<Alert>, TickFailed> {
    guard_tick(tick, || engine.on_tick_at(tick, now))
}

pub(crate) fn guard_tick<T>(tick: &Tick, f: impl FnOnce() -> T) -> Result<T, TickFailed> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|_| {
        tracing::error!(symbol = %tick.symbol, price = tick.price, "Tick processing panicked, skipping tick");
        TickFailed
    })
}

pub async fn run_engine(
    mut engine: AlertEngine,
    mut tick_rx: mpsc::Receiver<Tick>,
    alert_tx: mpsc::Sender<Alert>,
    daily_reset: bool,
    mut shutdown: watch::Receiver<bool>,
) -> EngineStats {
    let mut stats = EngineStats::default();
    let mut rollover = DailyRollover::default();

    loop {
        tokio::select! {
            maybe_tick = tick_rx.recv() => {
                let Some(tick) = maybe_tick else {
                    tracing::info!("Tick stream closed");
                    break;
                };
                let now = Utc::now();
                if daily_reset && rollover.crossed(now) {
                    tracing::info!(instruments = engine.instrument_count(), "UTC day rolled over, clearing instrument state");
                    engine.reset();
                    stats.resets += 1;
                }

                stats.ticks += 1;
                let alert = match process_tick(&mut engine, &tick, now) {
                    Ok(alert) => alert,
                    Err(TickFailed) => {
                        stats.ticks_failed += 1;
                        continue;
                    }
                };
                let Some(alert) = alert else { continue };

                stats.alerts += 1;
                tracing::info!(
                    symbol = %alert.symbol,
                    kind = %alert.kind,
                    relative_volume = alert.relative_volume,
                    "Alert triggered"
                );
                match alert_tx.try_send(alert) {
                    Ok(()) => {}
                    Err(TrySendError::Full(alert)) => {
                        stats.alerts_dropped += 1;
                        tracing::warn!(symbol = %alert.symbol, "Alert channel full, dropping alert");
                    }
                    Err(TrySendError::Closed(alert)) => {
                        stats.alerts_dropped += 1;
                        tracing::warn!(symbol = %alert.symbol, "Alert sink gone, dropping alert");
                    }
                }
            }
            _ = shutdown.changed() => {
                tracing::info!("Engine task shutting down");
                break;
            }
        }
    }

    tracing::info!(
        ticks = stats.ticks,
        alerts = stats.alerts,
        dropped = stats.alerts_dropped,
        "Engine stopped"
    );
    stats
}

/// Hands alerts to the sink one at a time. A failed write is logged and skipped.
pub async fn run_sink_dispatcher<S: AlertSink>(
    sink: S,
    mut alert_rx: mpsc::Receiver<Alert>,
    mut shutdown: watch::Receiver<bool>,
) -> DispatchStats {
    let mut stats = DispatchStats::default();

    loop {
        tokio::select! {
            maybe_alert = alert_rx.recv() => {
                let Some(alert) = maybe_alert else { break };
                match sink.record(&alert).await {
                    Ok(()) => {
                        stats.delivered += 1;
                        tracing::debug!(symbol = %alert.symbol, kind = %alert.kind, "Alert recorded");
                    }
                    Err(e) => {
                        stats.failed += 1;
                        tracing::warn!(
                            error = %e,
                            sink = sink.name(),
                            symbol = %alert.symbol,
                            kind = %alert.kind,
                            "Alert sink write failed"
                        );
                    }
                }
            }
            _ = shutdown.changed() => break,
        }
    }
    stats
}

use chrono::{DateTime, Utc};

use crate::classifier::AlertClassifier;
use crate::config::ScannerConfig;
use crate::model::alert::Alert;
use crate::model::tick::Tick;
use crate::tracker::{HighWaterMarkTracker, RollingVolumeTracker};

/// Read-only view of what the trackers hold for one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentState {
    pub volume_history: Vec<f64>,
    pub baseline_volume: Option<f64>,
    pub daily_high: Option<f64>,
}

/// Applies ticks to the trackers in arrival order and classifies each one.
#[derive(Debug, Clone, Default)]
pub struct AlertEngine {
    volume: RollingVolumeTracker,
    highs: HighWaterMarkTracker,
    classifier: AlertClassifier,
    ticks_seen: u64,
    alerts_raised: u64,
}

impl AlertEngine {
    pub fn new(
        volume: RollingVolumeTracker,
        highs: HighWaterMarkTracker,
        classifier: AlertClassifier,
    ) -> Self {
        Self {
            volume,
            highs,
            classifier,
            ticks_seen: 0,
            alerts_raised: 0,
        }
    }

    pub fn from_config(cfg: &ScannerConfig) -> Self {
        Self::new(
            RollingVolumeTracker::new(cfg.history_len, cfg.warmup_len),
            HighWaterMarkTracker::new(),
            AlertClassifier::new(cfg.volume_threshold),
        )
    }

    pub fn on_tick(&mut self, tick: &Tick) -> Option<Alert> {
        self.on_tick_at(tick, Utc::now())
    }

    pub fn on_tick_at(&mut self, tick: &Tick, now: DateTime<Utc>) -> Option<Alert> {
        self.ticks_seen += 1;
        let baseline = self.volume.observe(&tick.symbol, tick.notional_volume());
        let high = self.highs.observe(&tick.symbol, tick.price);
        let alert = self.classifier.classify(tick, baseline, high, now);
        if alert.is_some() {
            self.alerts_raised += 1;
        }
        alert
    }

    pub fn instrument_state(&self, symbol: &str) -> Option<InstrumentState> {
        let daily_high = self.highs.high(symbol);
        let baseline_volume = self.volume.last_baseline(symbol);
        if daily_high.is_none() && baseline_volume.is_none() {
            return None;
        }
        Some(InstrumentState {
            volume_history: self.volume.history(symbol),
            baseline_volume,
            daily_high,
        })
    }

    /// Drop all per-instrument state. Every instrument warms up again afterwards.
    pub fn reset(&mut self) {
        self.volume.clear();
        self.highs.reset();
    }

    pub fn instrument_count(&self) -> usize {
        self.volume.instrument_count()
    }

    pub fn ticks_seen(&self) -> u64 {
        self.ticks_seen
    }

    pub fn alerts_raised(&self) -> u64 {
        self.alerts_raised
    }
}

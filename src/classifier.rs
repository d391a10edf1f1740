use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::alert::{Alert, AlertKind};
use crate::model::tick::Tick;
use crate::tracker::HighObservation;

pub const DEFAULT_VOLUME_THRESHOLD: f64 = 1.5;

/// Turns one tick plus tracker outputs into at most one alert.
///
/// Both conditions are evaluated; when both match the alert is reported as
/// [`AlertKind::NewHigh`] and still carries the computed relative volume.
#[derive(Debug, Clone)]
pub struct AlertClassifier {
    volume_threshold: f64,
}

impl Default for AlertClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_VOLUME_THRESHOLD)
    }
}

impl AlertClassifier {
    pub fn new(volume_threshold: f64) -> Self {
        Self { volume_threshold }
    }

    pub fn volume_threshold(&self) -> f64 {
        self.volume_threshold
    }

    pub fn classify(
        &self,
        tick: &Tick,
        baseline_volume: f64,
        high: HighObservation,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        let relative_volume = relative_volume(tick.notional_volume(), baseline_volume);

        let mut kind = None;
        if relative_volume >= self.volume_threshold {
            kind = Some(AlertKind::VolumeSpike);
        }
        if high.is_new_high {
            kind = Some(AlertKind::NewHigh);
        }

        kind.map(|kind| Alert {
            id: Uuid::new_v4(),
            symbol: tick.symbol.clone(),
            price: tick.price,
            change_percent: tick.change_percent,
            relative_volume,
            kind,
            created_at: now,
        })
    }
}

/// Current over baseline. A non-positive baseline yields 1.0 so it can never spike.
pub fn relative_volume(notional_volume: f64, baseline_volume: f64) -> f64 {
    if baseline_volume > 0.0 && baseline_volume.is_finite() {
        notional_volume / baseline_volume
    } else {
        1.0
    }
}

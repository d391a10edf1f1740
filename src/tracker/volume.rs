use std::collections::{HashMap, VecDeque};

pub const DEFAULT_HISTORY_LEN: usize = 10;
pub const DEFAULT_WARMUP_LEN: usize = 5;

#[derive(Debug, Clone, Default)]
struct VolumeHistory {
    samples: VecDeque<f64>,
    baseline: Option<f64>,
}

impl VolumeHistory {
    fn mean(&self) -> f64 {
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }
}

/// Simple moving average of notional volume per instrument, with warm-up suppression.
///
/// The warm-up check and the mean are taken over the samples held *before* the
/// current one is appended. Until `warmup_len` samples are held the baseline is the
/// current volume itself, so relative volume is exactly 1.0.
#[derive(Debug, Clone)]
pub struct RollingVolumeTracker {
    history_len: usize,
    warmup_len: usize,
    histories: HashMap<String, VolumeHistory>,
}

impl Default for RollingVolumeTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN, DEFAULT_WARMUP_LEN)
    }
}

impl RollingVolumeTracker {
    pub fn new(history_len: usize, warmup_len: usize) -> Self {
        assert!(history_len > 0, "volume history length must be > 0");
        assert!(
            (1..=history_len).contains(&warmup_len),
            "volume warm-up length must be within 1..=history length"
        );
        Self {
            history_len,
            warmup_len,
            histories: HashMap::new(),
        }
    }

    /// Record `notional_volume` for `symbol` and return the baseline to compare it against.
    pub fn observe(&mut self, symbol: &str, notional_volume: f64) -> f64 {
        let history = self.histories.entry(symbol.to_string()).or_default();

        let baseline = if history.samples.len() < self.warmup_len {
            notional_volume
        } else {
            history.mean()
        };

        if history.samples.len() == self.history_len {
            history.samples.pop_front();
        }
        history.samples.push_back(notional_volume);
        history.baseline = Some(baseline);
        baseline
    }

    pub fn history(&self, symbol: &str) -> Vec<f64> {
        self.histories
            .get(symbol)
            .map(|h| h.samples.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Baseline returned by the most recent `observe` for `symbol`.
    pub fn last_baseline(&self, symbol: &str) -> Option<f64> {
        self.histories.get(symbol).and_then(|h| h.baseline)
    }

    pub fn history_len(&self) -> usize {
        self.history_len
    }

    pub fn warmup_len(&self) -> usize {
        self.warmup_len
    }

    pub fn instrument_count(&self) -> usize {
        self.histories.len()
    }

    pub fn clear(&mut self) {
        self.histories.clear();
    }
}

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighObservation {
    /// Stored high before this tick. Equals the tick price on an instrument's first tick.
    pub previous_high: f64,
    pub is_new_high: bool,
}

/// Highest trade price per instrument since the last reset.
#[derive(Debug, Clone, Default)]
pub struct HighWaterMarkTracker {
    highs: HashMap<String, f64>,
}

impl HighWaterMarkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, symbol: &str, price: f64) -> HighObservation {
        match self.highs.get_mut(symbol) {
            None => {
                self.highs.insert(symbol.to_string(), price);
                HighObservation {
                    previous_high: price,
                    is_new_high: false,
                }
            }
            Some(high) => {
                let previous_high = *high;
                let is_new_high = price > previous_high;
                if is_new_high {
                    *high = price;
                }
                HighObservation {
                    previous_high,
                    is_new_high,
                }
            }
        }
    }

    pub fn high(&self, symbol: &str) -> Option<f64> {
        self.highs.get(symbol).copied()
    }

    /// Forget every stored high (daily rollover).
    pub fn reset(&mut self) {
        self.highs.clear();
    }
}

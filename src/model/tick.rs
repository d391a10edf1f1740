/// One trade print for one instrument, as accepted by the stream decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub symbol: String,
    pub price: f64,
    pub size: f64,
    /// Percent change over the feed's reference period. Absent on the wire means 0.
    pub change_percent: f64,
}

impl Tick {
    pub fn new(symbol: impl Into<String>, price: f64, size: f64, change_percent: f64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            size,
            change_percent,
        }
    }

    /// Dollar volume of the print (price x size).
    pub fn notional_volume(&self) -> f64 {
        self.price * self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notional_volume_is_price_times_size() {
        let tick = Tick::new("BTC-USD", 25_000.0, 0.5, 1.2);
        assert!((tick.notional_volume() - 12_500.0).abs() < f64::EPSILON);
    }
}

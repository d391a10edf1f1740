use serde_json::Value;

use super::types::{RawEvent, StatusKind, StatusMessage};
use crate::error::AppError;
use crate::model::tick::Tick;

/// Result of decoding one inbound frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    pub ticks: Vec<Tick>,
    pub statuses: Vec<StatusMessage>,
    /// Elements that were neither a valid trade nor a status message.
    pub dropped: usize,
}

/// Normalizes single-object or batch frames into ticks and status messages.
#[derive(Debug, Clone)]
pub struct StreamDecoder {
    trade_event: String,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new("XT")
    }
}

impl StreamDecoder {
    pub fn new(trade_event: &str) -> Self {
        Self {
            trade_event: trade_event.to_string(),
        }
    }

    /// Only a frame that is not JSON at all is an error; bad elements are filtered.
    pub fn decode(&self, payload: &str) -> Result<Decoded, AppError> {
        let value: Value = serde_json::from_str(payload)?;
        let elements = match value {
            Value::Array(items) => items,
            other => vec![other],
        };

        let mut decoded = Decoded::default();
        for element in elements {
            self.accept(element, &mut decoded);
        }
        Ok(decoded)
    }

    fn accept(&self, element: Value, out: &mut Decoded) {
        let raw: RawEvent = match serde_json::from_value(element) {
            Ok(raw) => raw,
            Err(_) => {
                out.dropped += 1;
                return;
            }
        };

        match raw.ev.as_deref() {
            Some("status") => match raw.status {
                Some(status) => out.statuses.push(StatusMessage {
                    kind: StatusKind::parse(&status),
                    status,
                    message: raw.message.unwrap_or_default(),
                }),
                None => out.dropped += 1,
            },
            Some(ev) if ev == self.trade_event => match trade_to_tick(raw) {
                Some(tick) => out.ticks.push(tick),
                None => out.dropped += 1,
            },
            _ => out.dropped += 1,
        }
    }
}

fn trade_to_tick(raw: RawEvent) -> Option<Tick> {
    let symbol = raw.pair.filter(|p| !p.trim().is_empty())?;
    let price = raw.price.filter(|p| p.is_finite() && *p > 0.0)?;
    let size = raw.size.filter(|s| s.is_finite() && *s > 0.0)?;
    let change_percent = raw.change_percent.filter(|c| c.is_finite()).unwrap_or(0.0);
    Some(Tick {
        symbol,
        price,
        size,
        change_percent,
    })
}

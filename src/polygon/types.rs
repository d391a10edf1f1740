use serde::{Deserialize, Serialize};

/// Outbound control frame: `{"action": "...", "params": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlRequest<'a> {
    pub action: &'a str,
    pub params: &'a str,
}

impl<'a> ControlRequest<'a> {
    pub fn auth(api_key: &'a str) -> Self {
        Self {
            action: "auth",
            params: api_key,
        }
    }

    pub fn subscribe(params: &'a str) -> Self {
        Self {
            action: "subscribe",
            params,
        }
    }

    pub fn to_json(&self) -> String {
        // Two string fields; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Deserialize a numeric field that may be missing, null, or a non-number.
/// Anything but a JSON number becomes `None` so the element is filtered, not errored.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    Ok(v.as_f64())
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    Ok(v.as_str().map(str::to_string))
}

/// One element of an inbound frame before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEvent {
    #[serde(default, deserialize_with = "lenient_string")]
    pub ev: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pair: Option<String>,
    #[serde(default, rename = "p", deserialize_with = "lenient_f64")]
    pub price: Option<f64>,
    #[serde(default, rename = "v", deserialize_with = "lenient_f64")]
    pub size: Option<f64>,
    #[serde(default, rename = "dp", deserialize_with = "lenient_f64")]
    pub change_percent: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Connected,
    AuthSuccess,
    AuthFailed,
    SubscriptionSuccess,
    Other,
}

impl StatusKind {
    /// Match `auth_success`, `auth success`, `AUTH_SUCCESS`, ... alike.
    pub fn parse(status: &str) -> Self {
        let normalized = status.trim().replace('_', " ").to_ascii_lowercase();
        match normalized.as_str() {
            "connected" => StatusKind::Connected,
            "auth success" => StatusKind::AuthSuccess,
            "auth failed" | "auth timeout" => StatusKind::AuthFailed,
            "success" | "subscription success" => StatusKind::SubscriptionSuccess,
            _ => StatusKind::Other,
        }
    }
}

/// Control/status message consumed by the connection manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub status: String,
    pub message: String,
}

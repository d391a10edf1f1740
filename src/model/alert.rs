use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AlertKind {
    #[serde(rename = "volume")]
    VolumeSpike,
    #[serde(rename = "high")]
    NewHigh,
}

impl AlertKind {
    pub fn as_tag(&self) -> &'static str {
        match self {
            AlertKind::VolumeSpike => "volume",
            AlertKind::NewHigh => "high",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AlertKind::VolumeSpike => "Volume Alert",
            AlertKind::NewHigh => "New High",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Immutable alert handed to the sink. Field names match the `crypto_alerts` row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub id: Uuid,
    #[serde(rename = "ticker")]
    pub symbol: String,
    pub price: f64,
    pub change_percent: f64,
    pub relative_volume: f64,
    #[serde(rename = "alert_type")]
    pub kind: AlertKind,
    #[serde(serialize_with = "serialize_iso8601")]
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn created_at_iso(&self) -> String {
        self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

fn serialize_iso8601<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

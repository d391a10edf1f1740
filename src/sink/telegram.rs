use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use super::format::alert_message;
use super::AlertSink;
use crate::config::TelegramCredentials;
use crate::error::SinkError;
use crate::model::alert::Alert;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
}

/// Sends a formatted message per alert through the Telegram Bot API.
pub struct TelegramNotifier {
    http: reqwest::Client,
    send_url: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(creds: &TelegramCredentials, timeout_secs: u64) -> Result<Self, SinkError> {
        Self::with_api_base(TELEGRAM_API_BASE, creds, timeout_secs)
    }

    pub fn with_api_base(
        api_base: &str,
        creds: &TelegramCredentials,
        timeout_secs: u64,
    ) -> Result<Self, SinkError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            send_url: format!(
                "{}/bot{}/sendMessage",
                api_base.trim_end_matches('/'),
                creds.bot_token
            ),
            chat_id: creds.chat_id.clone(),
        })
    }
}

#[async_trait]
impl AlertSink for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn record(&self, alert: &Alert) -> Result<(), SinkError> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text: alert_message(alert),
        };
        let resp = self.http.post(&self.send_url).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                service: "telegram",
                status: status.as_u16(),
                body,
            });
        }
        tracing::debug!(symbol = %alert.symbol, "Telegram alert sent");
        Ok(())
    }
}

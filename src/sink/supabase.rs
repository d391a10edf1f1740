use async_trait::async_trait;
use std::time::Duration;

use super::AlertSink;
use crate::config::SupabaseCredentials;
use crate::error::SinkError;
use crate::model::alert::Alert;

/// Inserts alerts into a Supabase table through its REST endpoint.
pub struct SupabaseSink {
    http: reqwest::Client,
    endpoint: String,
    service_role_key: String,
}

impl SupabaseSink {
    pub fn new(
        creds: &SupabaseCredentials,
        table: &str,
        timeout_secs: u64,
    ) -> Result<Self, SinkError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/rest/v1/{}", creds.url.trim_end_matches('/'), table),
            service_role_key: creds.service_role_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AlertSink for SupabaseSink {
    fn name(&self) -> &str {
        "supabase"
    }

    async fn record(&self, alert: &Alert) -> Result<(), SinkError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .header("Prefer", "return=minimal")
            .json(alert)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                service: "supabase",
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

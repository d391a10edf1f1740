//! Alert delivery backends. The engine only sees [`AlertSink::record`] and its
//! reported outcome; retries, if any, belong to the implementation.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::SinkConfig;
use crate::error::SinkError;
use crate::model::alert::Alert;

pub mod format;
pub mod sqlite;
pub mod supabase;
pub mod telegram;

pub use sqlite::SqliteAlertStore;
pub use supabase::SupabaseSink;
pub use telegram::TelegramNotifier;

#[async_trait]
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &str;

    async fn record(&self, alert: &Alert) -> Result<(), SinkError>;
}

#[async_trait]
impl<T: AlertSink + ?Sized> AlertSink for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn record(&self, alert: &Alert) -> Result<(), SinkError> {
        (**self).record(alert).await
    }
}

/// Writes the alert to the log only.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn record(&self, alert: &Alert) -> Result<(), SinkError> {
        tracing::info!(
            symbol = %alert.symbol,
            kind = %alert.kind,
            price = alert.price,
            change_percent = alert.change_percent,
            relative_volume = alert.relative_volume,
            "Alert"
        );
        Ok(())
    }
}

/// Runs sinks in order and stops at the first failure, so a failed
/// persistence write is never followed by a notification.
pub struct CompositeSink {
    sinks: Vec<Box<dyn AlertSink>>,
}

impl CompositeSink {
    pub fn new(sinks: Vec<Box<dyn AlertSink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl AlertSink for CompositeSink {
    fn name(&self) -> &str {
        "composite"
    }

    async fn record(&self, alert: &Alert) -> Result<(), SinkError> {
        for sink in &self.sinks {
            sink.record(alert).await?;
        }
        Ok(())
    }
}

/// Persistence backends first, then notification, then the log line.
pub fn build_sink(cfg: &SinkConfig) -> Result<CompositeSink, SinkError> {
    let mut sinks: Vec<Box<dyn AlertSink>> = Vec::new();

    if let Some(creds) = &cfg.supabase {
        sinks.push(Box::new(SupabaseSink::new(
            creds,
            &cfg.supabase_table,
            cfg.http_timeout_secs,
        )?));
    } else if let Some(path) = &cfg.sqlite_path {
        sinks.push(Box::new(SqliteAlertStore::open(path)?));
    }

    if let Some(creds) = &cfg.telegram {
        sinks.push(Box::new(TelegramNotifier::new(creds, cfg.http_timeout_secs)?));
    }

    sinks.push(Box::new(LogSink));
    Ok(CompositeSink::new(sinks))
}

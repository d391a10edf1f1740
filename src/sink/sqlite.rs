use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::AlertSink;
use crate::error::SinkError;
use crate::model::alert::Alert;

/// Alert row as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAlert {
    pub id: String,
    pub symbol: String,
    pub price: f64,
    pub change_percent: f64,
    pub relative_volume: f64,
    pub alert_type: String,
    pub created_at: String,
}

/// Alert table in a local SQLite file. Sink writes run on the blocking pool.
pub struct SqliteAlertStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAlertStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, SinkError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, SinkError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id TEXT PRIMARY KEY,
                ticker TEXT NOT NULL,
                price REAL NOT NULL,
                change_percent REAL NOT NULL,
                relative_volume REAL NOT NULL,
                alert_type TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS alerts_ticker_created_at
                ON alerts (ticker, created_at);
            "#,
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn insert(&self, alert: &Alert) -> Result<(), SinkError> {
        insert_alert(&self.conn, alert)
    }

    /// Newest first. `symbol = None` reads across all instruments.
    pub fn load_recent(
        &self,
        symbol: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredAlert>, SinkError> {
        let conn = self.conn.lock().map_err(|_| SinkError::Poisoned)?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, ticker, price, change_percent, relative_volume, alert_type, created_at
            FROM alerts
            WHERE ?1 IS NULL OR ticker = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![symbol, limit as i64], |row| {
            Ok(StoredAlert {
                id: row.get(0)?,
                symbol: row.get(1)?,
                price: row.get(2)?,
                change_percent: row.get(3)?,
                relative_volume: row.get(4)?,
                alert_type: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;

        let mut alerts = Vec::new();
        for row in rows {
            alerts.push(row?);
        }
        Ok(alerts)
    }

    pub fn count(&self) -> Result<u64, SinkError> {
        let conn = self.conn.lock().map_err(|_| SinkError::Poisoned)?;
        let n = conn.query_row("SELECT COUNT(*) FROM alerts", [], |row| row.get::<_, i64>(0))?;
        Ok(n as u64)
    }
}

#[async_trait]
impl AlertSink for SqliteAlertStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn record(&self, alert: &Alert) -> Result<(), SinkError> {
        let conn = Arc::clone(&self.conn);
        let alert = alert.clone();
        tokio::task::spawn_blocking(move || insert_alert(&conn, &alert)).await?
    }
}

fn insert_alert(conn: &Mutex<Connection>, alert: &Alert) -> Result<(), SinkError> {
    let conn = conn.lock().map_err(|_| SinkError::Poisoned)?;
    conn.execute(
        r#"
        INSERT INTO alerts (
            id, ticker, price, change_percent, relative_volume, alert_type, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            alert.id.to_string(),
            alert.symbol,
            alert.price,
            alert.change_percent,
            alert.relative_volume,
            alert.kind.as_tag(),
            alert.created_at_iso(),
        ],
    )?;
    Ok(())
}


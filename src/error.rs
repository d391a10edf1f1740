use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("frame decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    #[error("authentication not acknowledged within {0} ms")]
    AuthTimeout(u64),
}

/// Failure reported by an [`AlertSink`](crate::sink::AlertSink) write.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} rejected write (status {status}): {body}")]
    Rejected {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blocking write task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("store lock poisoned")]
    Poisoned,
}

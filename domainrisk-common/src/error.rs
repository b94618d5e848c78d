// domainrisk-common/src/error.rs

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("evaluation already running")]
    AlreadyRunning,

    #[error("batch {0} not found")]
    BatchNotFound(i64),

    #[error("batch {0} has no domains to evaluate")]
    BatchEmpty(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("upstream status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error("AI explainer disabled")]
    AiDisabled,

    #[error("parse error: {0}")]
    Parse(String),

    #[error("cancelled")]
    Cancelled,
}

impl Error {
    /// Whether a retry may succeed: rate limiting, upstream 5xx, or a
    /// request that never completed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::UpstreamStatus { status, .. } => matches!(*status, 429 | 500 | 503),
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Parse(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Parse(s.to_string())
    }
}

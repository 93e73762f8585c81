use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("failed to read history file: {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write history file: {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupted history file: {}", path.display())]
    Corrupted {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize history")]
    Serialize(#[source] serde_json::Error),

    #[error("invalid pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("invalid date `{0}`, expected yyyy-mm-dd")]
    InvalidDate(String),
}

/// Failures of a single remote call. Each one is recoverable at the batch
/// item level.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{message}")]
    Rejected { message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("aborted by user")]
    Aborted,

    #[error("expect an index between 1 and {max}, got `{input}`")]
    InvalidSelection { input: String, max: usize },
}

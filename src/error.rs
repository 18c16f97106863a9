use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Connection or timeout failure before a response arrived; retryable.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Non-JSON response: {body}")]
    NonJson { body: String },

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EtlError {
    /// Whether the resilient client may retry the request that produced this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, EtlError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

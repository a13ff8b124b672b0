use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {message}")]
    Transport { message: String, retriable: bool },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Metric '{0}' not found")]
    NotFound(String),

    #[error("Storage error: {message}")]
    Storage { message: String, retriable: bool },

    #[error("Signature mismatch")]
    Signature,

    #[error("Request origin not allowed")]
    Forbidden,

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MetricsError>;

impl MetricsError {
    /// Connect-class failures that the retry schedules are allowed to absorb.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Transport { retriable, .. } | Self::Storage { retriable, .. } => *retriable,
            _ => false,
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            retriable: false,
        }
    }

    pub fn transport(message: impl Into<String>, retriable: bool) -> Self {
        Self::Transport {
            message: message.into(),
            retriable,
        }
    }
}

impl From<serde_json::Error> for MetricsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(err.to_string())
    }
}

//! Domain-level error taxonomy for TrafficIQ.

/// TrafficIQ domain errors.
#[derive(Debug, thiserror::Error)]
pub enum TrafficError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote service {service} returned {status}: {body}")]
    Remote {
        service: String,
        status: u16,
        body: String,
    },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("corrupt record at line {line}: {reason}")]
    CorruptRecord { line: usize, reason: String },
}

/// Result type for TrafficIQ domain operations.
pub type Result<T> = std::result::Result<T, TrafficError>;

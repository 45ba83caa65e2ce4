//! Error types for local log store operations.

/// Errors returned by local log stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// The write would exceed a configured capacity limit.
    #[error("local store quota exceeded: {0}")]
    QuotaExceeded(String),
}

//! Error types for remote store operations.

/// Errors returned by remote stores and the remote client handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// No remote connection has been initialized.
    #[error("remote store not configured")]
    NotConfigured,
    /// Url or key rejected while building the client.
    #[error("invalid remote configuration: {0}")]
    InvalidConfig(String),
    /// The target table does not exist.
    #[error("remote relation missing: {0}")]
    RelationMissing(String),
    /// The called stored procedure does not exist.
    #[error("remote procedure missing: {0}")]
    ProcedureMissing(String),
    /// The connection could not be established; the request never reached
    /// the server.
    #[error("remote unreachable: {0}")]
    Unreachable(String),
    /// Timeout or server-side error; the request may have been applied.
    #[error("remote unavailable: {0}")]
    Unavailable(String),
    /// The remote store rejected the request.
    #[error("remote error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
    /// The response could not be decoded.
    #[error("failed to decode remote response: {0}")]
    Decode(String),
    /// Persisting or loading credentials failed.
    #[error("credential store error: {0}")]
    Credentials(String),
}

impl RemoteError {
    /// True when the table or a procedure is missing.
    pub fn is_schema_missing(&self) -> bool {
        matches!(
            self,
            RemoteError::RelationMissing(_) | RemoteError::ProcedureMissing(_)
        )
    }

    /// True for failures that may succeed on retry.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            RemoteError::Unreachable(_) | RemoteError::Unavailable(_)
        )
    }

    /// True when the request is known not to have been applied.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, RemoteError::Unreachable(_))
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::Decode(err.to_string())
        } else if err.is_builder() {
            RemoteError::InvalidConfig(err.to_string())
        } else if err.is_connect() {
            RemoteError::Unreachable(err.to_string())
        } else if err.is_timeout() {
            RemoteError::Unavailable(format!("request timed out: {err}"))
        } else {
            RemoteError::Unavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::Decode(err.to_string())
    }
}

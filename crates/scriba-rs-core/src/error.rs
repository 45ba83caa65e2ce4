//! Error types for the interaction log service.

use scriba_rs_protocol::InteractionRecord;
use scriba_rs_remote::RemoteError;
use scriba_rs_store::StoreError;
use thiserror::Error;

/// Errors returned by interaction log operations.
#[derive(Debug, Error)]
pub enum InteractionError {
    /// The remote store was needed but has not been configured.
    #[error("remote store not configured: {0}")]
    Configuration(String),
    /// The remote table or procedures are missing and could not be created.
    #[error("remote schema error: {0}")]
    Schema(String),
    /// Local persistence failed.
    #[error("local storage error: {0}")]
    Storage(#[from] StoreError),
    /// No record with the given id exists.
    #[error("interaction not found: {0}")]
    NotFound(String),
    /// The remote store failed or could not be reached.
    #[error("remote error: {0}")]
    TransientRemote(RemoteError),
    /// Model output did not contain parseable JSON.
    #[error("malformed model output: {0}")]
    MalformedModelOutput(String),
    /// Neither store accepted the write.
    #[error("interaction not persisted (remote: {remote}; local: {local})")]
    Unpersisted {
        /// Record as built in memory.
        record: Box<InteractionRecord>,
        remote: String,
        local: StoreError,
    },
    /// Export serialization failed.
    #[error("export failed: {0}")]
    Export(String),
}

impl From<RemoteError> for InteractionError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::NotConfigured | RemoteError::InvalidConfig(_) => {
                InteractionError::Configuration(err.to_string())
            }
            RemoteError::RelationMissing(_) | RemoteError::ProcedureMissing(_) => {
                InteractionError::Schema(err.to_string())
            }
            other => InteractionError::TransientRemote(other),
        }
    }
}

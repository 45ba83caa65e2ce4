//! Confirmation hook for irreversible operations.

use async_trait::async_trait;

/// Asks the user before an irreversible action runs.
#[async_trait]
pub trait Confirm: Send + Sync {
    /// Return `true` to proceed with the action described by `message`.
    async fn confirm(&self, message: &str) -> bool;
}

/// Confirmation with a fixed answer, for non-interactive callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoConfirm(pub bool);

#[async_trait]
impl Confirm for AutoConfirm {
    async fn confirm(&self, _message: &str) -> bool {
        self.0
    }
}

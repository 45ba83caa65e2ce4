//! Ordered fallback across alternative remote access strategies.

use crate::error::RemoteError;
use log::{debug, warn};
use std::fmt;
use std::future::Future;

/// Way of reaching the remote table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Call a stored procedure.
    StoredProcedure,
    /// Address the table directly.
    DirectTable,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::StoredProcedure => f.write_str("stored_procedure"),
            Strategy::DirectTable => f.write_str("direct_table"),
        }
    }
}

/// Tagged result of a single strategy attempt.
#[derive(Debug)]
pub enum Attempt<T> {
    Ok(T),
    /// The table or procedure the strategy needs does not exist.
    SchemaMissing(RemoteError),
    /// The remote could not be reached.
    Unavailable(RemoteError),
    /// The remote answered with a definitive failure.
    Failed(RemoteError),
}

impl<T> Attempt<T> {
    /// Tag a finished call by how the next strategy should react to it.
    pub fn from_result(result: Result<T, RemoteError>) -> Self {
        match result {
            Ok(value) => Attempt::Ok(value),
            Err(err) if err.is_schema_missing() => Attempt::SchemaMissing(err),
            Err(err) if err.is_unavailable() => Attempt::Unavailable(err),
            Err(err) => Attempt::Failed(err),
        }
    }

    /// Tag a finished write.
    ///
    /// Only failures where the request never reached the server move on to
    /// the next strategy; a timeout or server error may follow a committed
    /// write and is final.
    pub fn from_write_result(result: Result<T, RemoteError>) -> Self {
        match result {
            Ok(value) => Attempt::Ok(value),
            Err(err) if err.is_schema_missing() => Attempt::SchemaMissing(err),
            Err(err) if err.is_unreachable() => Attempt::Unavailable(err),
            Err(err) => Attempt::Failed(err),
        }
    }
}

/// Strategy order for an operation.
pub fn plan(use_stored_procedures: bool) -> Vec<Strategy> {
    if use_stored_procedures {
        vec![Strategy::StoredProcedure, Strategy::DirectTable]
    } else {
        vec![Strategy::DirectTable]
    }
}

/// Run `attempt` for each strategy in order.
///
/// Moves to the next strategy on `SchemaMissing` or `Unavailable` and stops at
/// the first success or `Failed`. When every strategy is exhausted the last
/// error is returned.
pub async fn dispatch<T, F, Fut>(
    operation: &str,
    strategies: &[Strategy],
    mut attempt: F,
) -> Result<T, RemoteError>
where
    F: FnMut(Strategy) -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let mut last_error = None;
    for strategy in strategies.iter().copied() {
        match attempt(strategy).await {
            Attempt::Ok(value) => {
                debug!(
                    "remote operation succeeded (operation={}, strategy={})",
                    operation, strategy
                );
                return Ok(value);
            }
            Attempt::SchemaMissing(err) | Attempt::Unavailable(err) => {
                warn!(
                    "remote strategy unusable; trying next (operation={}, strategy={}, error={})",
                    operation, strategy, err
                );
                last_error = Some(err);
            }
            Attempt::Failed(err) => {
                warn!(
                    "remote strategy failed (operation={}, strategy={}, error={})",
                    operation, strategy, err
                );
                return Err(err);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| {
        RemoteError::InvalidConfig(format!("no strategy available for {operation}"))
    }))
}

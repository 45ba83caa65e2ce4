//! Durable local log of AI interactions.
//!
//! Holds records that could not reach the remote store until they are synced.

pub mod error;
pub mod store;

/// Local store error type.
pub use error::StoreError;
/// Local log store interface and default file implementation.
pub use store::{FileLogStore, LOCAL_LOG_FILE, LocalLogStore, StoreLimits};

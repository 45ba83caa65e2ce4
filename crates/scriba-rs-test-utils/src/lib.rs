//! Test helpers shared across Scriba crates.

pub mod local;
pub mod records;
pub mod remote;

pub use local::{FailingLogStore, MemoryLogStore};
pub use records::{local_record, remote_record, sample_input, timestamp};
pub use remote::{RemoteCalls, StubRemote};

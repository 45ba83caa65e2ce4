//! Remote store client for the interaction log.
//!
//! Speaks the PostgREST dialect with an ordered fallback from stored
//! procedures to direct table access.

pub mod client;
pub mod error;
pub mod postgrest;
pub mod schema;
pub mod store;
pub mod strategy;

pub use client::{Connector, CredentialStore, RemoteClient, RemoteCredentials};
pub use error::RemoteError;
pub use postgrest::{PostgrestOptions, PostgrestStore};
pub use store::{INTERACTIONS_TABLE, RemotePage, RemoteQuery, RemoteStore, WipeConfirmation};
pub use strategy::{Attempt, Strategy};

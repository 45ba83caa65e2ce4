//! Interaction log service for Scriba.
//!
//! This crate owns the dual-write protocol between the remote store and the
//! local log: recording with local fallback, merged listings, sync, deletion,
//! clearing and export, plus JSON extraction from model output.

pub mod confirm;
pub mod error;
pub mod export;
pub mod extract;
mod service;
pub mod settings;

pub use confirm::{AutoConfirm, Confirm};
pub use error::InteractionError;
pub use export::{export_filename, render_export};
pub use extract::{parse_model_json, parse_model_json_as};
/// Interaction log service facade.
pub use service::InteractionLog;
pub use settings::LogSettings;

//! Configuration models and layered config loading.
//!
//! This crate owns the Scriba config schema, validation, environment
//! overrides, and layer-merging logic used by the SDK and CLI.

mod error;
mod loader;
mod model;

/// Public error type returned by config loading and validation APIs.
pub use error::ConfigError;
/// Layered config types, loader options and environment variable names.
pub use loader::{
    ConfigLayer, ConfigLayerSource, ENV_REMOTE_KEY, ENV_REMOTE_URL, LayeredConfig,
    LayeredConfigOptions,
};
/// Configuration schema models.
pub use model::*;

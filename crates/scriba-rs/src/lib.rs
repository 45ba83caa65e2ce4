//! Public SDK surface for Scriba.
//!
//! This crate re-exports the building blocks and provides helpers that wire
//! an [`InteractionLog`] from configuration.

/// Re-export for convenience.
pub use scriba_rs_config as config;
pub use scriba_rs_core as core;
/// Re-export for convenience.
pub use scriba_rs_protocol as protocol;
pub use scriba_rs_remote as remote;
pub use scriba_rs_store as store;

pub use scriba_rs_core::{InteractionError, InteractionLog, LogSettings};

use log::{debug, info};
use scriba_rs_config::ScribaConfig;
use scriba_rs_remote::{CredentialStore, PostgrestOptions, RemoteClient};
use scriba_rs_store::{FileLogStore, StoreError, StoreLimits};
use std::sync::Arc;
use std::time::Duration;

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// This is a no-op if the feature is not enabled. Binaries are still expected
/// to call this early in startup to ensure log output is wired up.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::try_init();
    }
}

/// Remote client configured from `config`.
///
/// Explicit url/key settings take precedence over credentials saved under
/// the data directory and are never written there.
pub fn remote_client(config: &ScribaConfig) -> RemoteClient {
    let options = PostgrestOptions {
        timeout: Duration::from_secs(config.remote.timeout_secs),
        use_stored_procedures: config.remote.use_stored_procedures,
    };
    let client = RemoteClient::new(options)
        .with_credential_store(CredentialStore::new(config.credentials_path()));
    match config.remote.credentials() {
        Some((url, key)) => {
            debug!("connecting remote client from config");
            client.connect(url, key);
        }
        None => {
            client.restore();
        }
    }
    client
}

/// Open the interaction log described by `config`.
pub fn open_log(config: &ScribaConfig) -> Result<InteractionLog, StoreError> {
    let limits = StoreLimits {
        max_records: config.local.max_records,
        max_bytes: config.local.max_bytes,
    };
    let local = Arc::new(FileLogStore::with_limits(config.data_dir(), limits)?);
    let remote = remote_client(config);
    info!(
        "interaction log opened (data_dir={}, remote_ready={})",
        config.data_dir().display(),
        remote.is_ready()
    );
    Ok(InteractionLog::new(
        local,
        remote,
        LogSettings::from_config(config),
    ))
}

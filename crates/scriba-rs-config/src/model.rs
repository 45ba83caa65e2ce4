//! Configuration schema for Scriba.

use directories::UserDirs;
use scriba_rs_protocol::{SortDirection, SortKey};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Directory under the home dir holding user config and data.
pub const DEFAULT_HOME_DIR: &str = ".scriba";
/// File holding persisted remote credentials.
pub const DEFAULT_CREDENTIALS_FILE: &str = "credentials.json";

/// Root config for the Scriba interaction log.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScribaConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub list: ListConfig,
}

impl ScribaConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> ScribaConfigBuilder {
        ScribaConfigBuilder::new()
    }

    /// Directory that holds the local log and persisted credentials.
    pub fn data_dir(&self) -> PathBuf {
        match self.local.path.as_deref() {
            Some(path) => PathBuf::from(path),
            None => default_data_dir(),
        }
    }

    /// Location of the persisted remote credentials file.
    pub fn credentials_path(&self) -> PathBuf {
        match self.remote.credentials_path.as_deref() {
            Some(path) => PathBuf::from(path),
            None => self.data_dir().join(DEFAULT_CREDENTIALS_FILE),
        }
    }
}

/// Builder for assembling a `ScribaConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct ScribaConfigBuilder {
    config: ScribaConfig,
}

impl ScribaConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ScribaConfig::default(),
        }
    }

    /// Replace the remote store configuration.
    pub fn remote(mut self, remote: RemoteConfig) -> Self {
        self.config.remote = remote;
        self
    }

    /// Replace the local store configuration.
    pub fn local(mut self, local: LocalConfig) -> Self {
        self.config.local = local;
        self
    }

    pub fn sync(mut self, sync: SyncConfig) -> Self {
        self.config.sync = sync;
        self
    }

    pub fn list(mut self, list: ListConfig) -> Self {
        self.config.list = list;
        self
    }

    /// Finalize and return the built `ScribaConfig`.
    pub fn build(self) -> ScribaConfig {
        self.config
    }
}

/// Remote store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the remote REST endpoint.
    #[serde(default)]
    pub url: Option<String>,
    /// API key sent with every request.
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Try stored procedures before direct table access.
    #[serde(default = "default_true")]
    pub use_stored_procedures: bool,
    /// Create the remote schema on demand when it is missing.
    #[serde(default)]
    pub auto_create_schema: bool,
    #[serde(default)]
    pub credentials_path: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            key: None,
            timeout_secs: default_timeout_secs(),
            use_stored_procedures: true,
            auto_create_schema: false,
            credentials_path: None,
        }
    }
}

impl RemoteConfig {
    /// Url and key when both are present and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let url = self.url.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
        let key = self.key.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
        Some((url, key))
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

/// Local log store settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LocalConfig {
    /// Data directory; defaults to `~/.scriba/data`.
    #[serde(default)]
    pub path: Option<String>,
    /// Maximum number of records held locally.
    #[serde(default)]
    pub max_records: Option<usize>,
    /// Maximum size in bytes of the serialized local collection.
    #[serde(default)]
    pub max_bytes: Option<u64>,
}

/// Settings for pushing local-only records to the remote store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Run a sync pass when the log is opened.
    #[serde(default)]
    pub on_startup: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            on_startup: false,
        }
    }
}

fn default_batch_size() -> usize {
    10
}

/// How pagination behaves when remote and local records are merged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MergePagination {
    /// Merge every matching record, then slice. Totals are exact.
    #[default]
    Exact,
    /// Merge one remote page with all local records, then truncate.
    Approximate,
}

/// Defaults for listing requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub sort_by: SortKey,
    #[serde(default)]
    pub sort_direction: SortDirection,
    #[serde(default)]
    pub merge_pagination: MergePagination,
    /// Page size used when pulling every remote record for an exact merge.
    #[serde(default = "default_remote_chunk_size")]
    pub remote_chunk_size: usize,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            sort_by: SortKey::default(),
            sort_direction: SortDirection::default(),
            merge_pagination: MergePagination::default(),
            remote_chunk_size: default_remote_chunk_size(),
        }
    }
}

fn default_page_size() -> usize {
    50
}

fn default_remote_chunk_size() -> usize {
    500
}

/// Default data directory under the user's home.
pub fn default_data_dir() -> PathBuf {
    UserDirs::new()
        .map(|dirs| dirs.home_dir().join(DEFAULT_HOME_DIR).join("data"))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_HOME_DIR).join("data"))
}

//! Explicit remote connection handle with persisted credentials.

use crate::error::RemoteError;
use crate::postgrest::{PostgrestOptions, PostgrestStore};
use crate::store::RemoteStore;
use log::{debug, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Remote url and key pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCredentials {
    pub url: String,
    pub key: String,
}

impl fmt::Debug for RemoteCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCredentials")
            .field("url", &self.url)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// JSON file holding the last successfully initialized credentials.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load persisted credentials; `None` when nothing was saved.
    pub fn load(&self) -> Result<Option<RemoteCredentials>, RemoteError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(RemoteError::Credentials(err.to_string())),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|err| RemoteError::Credentials(format!("malformed credentials file: {err}")))
    }

    /// Persist credentials, readable only by the current user on Unix.
    pub fn save(&self, credentials: &RemoteCredentials) -> Result<(), RemoteError> {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut options = OpenOptions::new();
            options.create(true).truncate(true).write(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }
            let mut file = options.open(&self.path)?;
            let payload = serde_json::to_vec_pretty(credentials)?;
            file.write_all(&payload)?;
            Ok(())
        };
        write().map_err(|err| RemoteError::Credentials(err.to_string()))
    }

    /// Remove persisted credentials; absent files are fine.
    pub fn clear(&self) -> Result<(), RemoteError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(RemoteError::Credentials(err.to_string())),
        }
    }
}

/// Builds a remote store from a url and key.
pub type Connector =
    dyn Fn(&str, &str) -> Result<Arc<dyn RemoteStore>, RemoteError> + Send + Sync;

/// Handle to the remote store shared by the interaction log.
///
/// Starts unconfigured. `initialize` connects and persists credentials,
/// `restore` reconnects from persisted credentials, `reset` forgets both.
pub struct RemoteClient {
    store: RwLock<Option<Arc<dyn RemoteStore>>>,
    connector: Arc<Connector>,
    credentials: Option<CredentialStore>,
}

impl RemoteClient {
    /// Unconfigured client that connects through PostgREST.
    pub fn new(options: PostgrestOptions) -> Self {
        Self::with_connector(Arc::new(move |url: &str, key: &str| {
            let store: Arc<dyn RemoteStore> = Arc::new(PostgrestStore::new(url, key, options)?);
            Ok(store)
        }))
    }

    /// Unconfigured client using a custom connector.
    pub fn with_connector(connector: Arc<Connector>) -> Self {
        Self {
            store: RwLock::new(None),
            connector,
            credentials: None,
        }
    }

    /// Client already connected to `store`.
    pub fn from_store(store: Arc<dyn RemoteStore>) -> Self {
        let client = Self::new(PostgrestOptions::default());
        *client.store.write() = Some(store);
        client
    }

    /// Persist credentials through `store` on successful initialization.
    pub fn with_credential_store(mut self, store: CredentialStore) -> Self {
        self.credentials = Some(store);
        self
    }

    /// Connect with `url` and `key` and remember them for later sessions;
    /// returns whether the client is ready.
    pub fn initialize(&self, url: &str, key: &str) -> bool {
        if !self.connect(url, key) {
            return false;
        }
        if let Some(credentials) = &self.credentials {
            let saved = credentials.save(&RemoteCredentials {
                url: url.trim().to_string(),
                key: key.trim().to_string(),
            });
            if let Err(err) = saved {
                warn!(
                    "failed to persist remote credentials (path={}, error={})",
                    credentials.path().display(),
                    err
                );
            }
        }
        true
    }

    /// Connect with `url` and `key` for this session only.
    pub fn connect(&self, url: &str, key: &str) -> bool {
        let url = url.trim();
        let key = key.trim();
        if url.is_empty() || key.is_empty() {
            warn!("remote initialization rejected: url and key are required");
            return false;
        }
        let store = match (self.connector)(url, key) {
            Ok(store) => store,
            Err(err) => {
                warn!("remote initialization failed (url={}, error={})", url, err);
                return false;
            }
        };
        *self.store.write() = Some(store);
        info!("remote client initialized (url={})", url);
        true
    }

    pub fn is_ready(&self) -> bool {
        self.store.read().is_some()
    }

    /// Reconnect from persisted credentials when not already ready.
    pub fn restore(&self) -> bool {
        if self.is_ready() {
            return true;
        }
        let Some(credentials) = &self.credentials else {
            return false;
        };
        match credentials.load() {
            Ok(Some(saved)) => {
                debug!("restoring remote client from saved credentials");
                self.connect(&saved.url, &saved.key)
            }
            Ok(None) => false,
            Err(err) => {
                warn!(
                    "failed to load remote credentials (path={}, error={})",
                    credentials.path().display(),
                    err
                );
                false
            }
        }
    }

    /// Drop the connection and forget persisted credentials.
    pub fn reset(&self) -> Result<(), RemoteError> {
        *self.store.write() = None;
        if let Some(credentials) = &self.credentials {
            credentials.clear()?;
        }
        info!("remote client reset");
        Ok(())
    }

    /// Current store, or `NotConfigured`.
    pub fn store(&self) -> Result<Arc<dyn RemoteStore>, RemoteError> {
        self.store.read().clone().ok_or(RemoteError::NotConfigured)
    }
}

impl fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteClient")
            .field("ready", &self.is_ready())
            .field("credentials", &self.credentials)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn client_in(dir: &Path) -> RemoteClient {
        RemoteClient::new(PostgrestOptions::default())
            .with_credential_store(CredentialStore::new(dir.join("credentials.json")))
    }

    #[test]
    fn initialize_rejects_empty_arguments() {
        let temp = tempdir().expect("tempdir");
        let client = client_in(temp.path());
        assert!(!client.initialize("", "key"));
        assert!(!client.initialize("https://x.supabase.co", "   "));
        assert!(!client.is_ready());
        assert_eq!(client.store().err(), Some(RemoteError::NotConfigured));
    }

    #[test]
    fn initialize_persists_and_restore_reconnects() {
        let temp = tempdir().expect("tempdir");
        let client = client_in(temp.path());
        assert!(client.initialize("https://x.supabase.co", "anon-key"));
        assert!(client.is_ready());

        let restored = client_in(temp.path());
        assert!(!restored.is_ready());
        assert!(restored.restore());
        assert!(restored.is_ready());
    }

    #[test]
    fn connect_does_not_persist_credentials() {
        let temp = tempdir().expect("tempdir");
        let client = client_in(temp.path());
        assert!(client.connect("https://x.supabase.co", "anon-key"));
        assert!(client.is_ready());
        assert!(!temp.path().join("credentials.json").exists());
        assert!(!client_in(temp.path()).restore());
    }

    #[test]
    fn reset_forgets_credentials() {
        let temp = tempdir().expect("tempdir");
        let client = client_in(temp.path());
        assert!(client.initialize("https://x.supabase.co", "anon-key"));
        client.reset().expect("reset");
        assert!(!client.is_ready());
        assert!(!client.restore());
        assert!(!temp.path().join("credentials.json").exists());
    }

    #[test]
    fn credentials_debug_redacts_key() {
        let credentials = RemoteCredentials {
            url: "https://x.supabase.co".to_string(),
            key: "secret".to_string(),
        };
        assert!(!format!("{credentials:?}").contains("secret"));
    }

    #[test]
    fn invalid_url_is_not_ready() {
        let temp = tempdir().expect("tempdir");
        let client = client_in(temp.path());
        assert!(!client.initialize("not a url", "anon-key"));
        assert!(!temp.path().join("credentials.json").exists());
    }
}

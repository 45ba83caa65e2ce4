//! Local log store interface and file-backed implementation.

use crate::error::StoreError;
use log::{debug, info, warn};
use parking_lot::Mutex;
use scriba_rs_protocol::{InteractionRecord, RecordId};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// File name of the persisted local collection.
pub const LOCAL_LOG_FILE: &str = "ai_interactions.json";

/// Durable store for interaction records that live on this machine.
pub trait LocalLogStore: Send + Sync {
    /// Append a record, rewriting the whole collection.
    fn append(&self, record: &InteractionRecord) -> Result<(), StoreError>;

    /// Read every stored record. Unreadable content yields an empty list.
    fn read_all(&self) -> Vec<InteractionRecord>;

    /// Look up a record by id.
    fn get(&self, id: &RecordId) -> Option<InteractionRecord> {
        self.read_all().into_iter().find(|record| &record.id == id)
    }

    /// Remove a record; `false` when it was not present.
    fn remove(&self, id: &RecordId) -> Result<bool, StoreError> {
        Ok(self.remove_many(std::slice::from_ref(id))? > 0)
    }

    /// Remove every listed record in a single rewrite; returns how many were removed.
    fn remove_many(&self, ids: &[RecordId]) -> Result<usize, StoreError>;

    /// Remove every record; returns how many were removed.
    fn clear(&self) -> Result<usize, StoreError>;

    fn len(&self) -> usize {
        self.read_all().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Capacity limits emulating a bounded key/value storage area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreLimits {
    pub max_records: Option<usize>,
    pub max_bytes: Option<u64>,
}

/// JSON-array file store under a data directory.
///
/// Every mutation is a read-modify-write of the whole collection performed
/// under `write_lock` and committed by renaming a temp file over the target.
pub struct FileLogStore {
    root: PathBuf,
    limits: StoreLimits,
    write_lock: Mutex<()>,
}

impl FileLogStore {
    /// Create a store under `root` with no capacity limits.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::with_limits(root, StoreLimits::default())
    }

    /// Create a store under `root` that rejects writes beyond `limits`.
    pub fn with_limits(root: impl AsRef<Path>, limits: StoreLimits) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        info!(
            "initialized file log store (root={}, max_records={:?}, max_bytes={:?})",
            root.display(),
            limits.max_records,
            limits.max_bytes
        );
        Ok(Self {
            root,
            limits,
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the collection file.
    pub fn path(&self) -> PathBuf {
        self.root.join(LOCAL_LOG_FILE)
    }

    fn temp_path(&self) -> PathBuf {
        self.root.join(format!("{LOCAL_LOG_FILE}.tmp"))
    }

    fn corrupt_path(&self) -> PathBuf {
        self.root.join(format!("{LOCAL_LOG_FILE}.corrupt"))
    }

    /// Load the collection, distinguishing "absent" from "unreadable".
    fn load(&self) -> Loaded {
        let path = self.path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Loaded::Records(Vec::new()),
            Err(err) => {
                warn!(
                    "local log unreadable (path={}, error={})",
                    path.display(),
                    err
                );
                return Loaded::Unreadable;
            }
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Loaded::Records(Vec::new());
        }
        match serde_json::from_slice::<Vec<InteractionRecord>>(&bytes) {
            Ok(records) => Loaded::Records(records),
            Err(err) => {
                warn!(
                    "local log malformed; treating as empty (path={}, error={})",
                    path.display(),
                    err
                );
                Loaded::Corrupt
            }
        }
    }

    /// Load for a mutation. A corrupt file is moved aside before it is replaced.
    fn load_for_write(&self) -> Result<Vec<InteractionRecord>, StoreError> {
        match self.load() {
            Loaded::Records(records) => Ok(records),
            Loaded::Corrupt => {
                let corrupt = self.corrupt_path();
                fs::rename(self.path(), &corrupt)?;
                warn!(
                    "moved malformed local log aside (path={})",
                    corrupt.display()
                );
                Ok(Vec::new())
            }
            Loaded::Unreadable => Err(StoreError::Io(std::io::Error::other(format!(
                "local log unreadable: {}",
                self.path().display()
            )))),
        }
    }

    fn check_limits(&self, count: usize, bytes: usize) -> Result<(), StoreError> {
        if let Some(max_records) = self.limits.max_records
            && count > max_records
        {
            return Err(StoreError::QuotaExceeded(format!(
                "{count} records exceeds max_records={max_records}"
            )));
        }
        if let Some(max_bytes) = self.limits.max_bytes
            && bytes as u64 > max_bytes
        {
            return Err(StoreError::QuotaExceeded(format!(
                "{bytes} bytes exceeds max_bytes={max_bytes}"
            )));
        }
        Ok(())
    }

    /// Rewrite the collection atomically.
    fn write_records(&self, records: &[InteractionRecord]) -> Result<(), StoreError> {
        let payload = serde_json::to_vec(records)?;
        self.check_limits(records.len(), payload.len())?;
        let temp_path = self.temp_path();
        {
            let mut file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&temp_path)?;
            file.write_all(&payload)?;
            file.sync_all()?;
        }
        fs::rename(temp_path, self.path())?;
        Ok(())
    }
}

enum Loaded {
    Records(Vec<InteractionRecord>),
    Corrupt,
    Unreadable,
}

impl LocalLogStore for FileLogStore {
    fn append(&self, record: &InteractionRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        let mut records = self.load_for_write()?;
        records.push(record.clone());
        self.write_records(&records)?;
        debug!(
            "appended local interaction (id={}, type={}, count={})",
            record.id,
            record.interaction_type,
            records.len()
        );
        Ok(())
    }

    fn read_all(&self) -> Vec<InteractionRecord> {
        match self.load() {
            Loaded::Records(records) => records,
            Loaded::Corrupt | Loaded::Unreadable => Vec::new(),
        }
    }

    fn remove_many(&self, ids: &[RecordId]) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let _guard = self.write_lock.lock();
        let mut records = self.load_for_write()?;
        let targets: HashSet<&RecordId> = ids.iter().collect();
        let before = records.len();
        records.retain(|record| !targets.contains(&record.id));
        let removed = before - records.len();
        if removed == 0 {
            debug!("no local interactions matched removal (requested={})", ids.len());
            return Ok(0);
        }
        self.write_records(&records)?;
        debug!(
            "removed local interactions (removed={}, remaining={})",
            removed,
            records.len()
        );
        Ok(removed)
    }

    fn clear(&self) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock();
        let removed = self.load_for_write()?.len();
        match fs::remove_file(self.path()) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        info!("cleared local interaction log (removed={})", removed);
        Ok(removed)
    }
}

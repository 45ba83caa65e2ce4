use parking_lot::Mutex;
use scriba_rs_protocol::{InteractionRecord, RecordId};
use scriba_rs_store::{LocalLogStore, StoreError};

/// In-memory local store.
#[derive(Default)]
pub struct MemoryLogStore {
    records: Mutex<Vec<InteractionRecord>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<InteractionRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

impl LocalLogStore for MemoryLogStore {
    fn append(&self, record: &InteractionRecord) -> Result<(), StoreError> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    fn read_all(&self) -> Vec<InteractionRecord> {
        self.records.lock().clone()
    }

    fn remove_many(&self, ids: &[RecordId]) -> Result<usize, StoreError> {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|record| !ids.contains(&record.id));
        Ok(before - records.len())
    }

    fn clear(&self) -> Result<usize, StoreError> {
        let mut records = self.records.lock();
        let removed = records.len();
        records.clear();
        Ok(removed)
    }
}

/// Local store whose writes always fail as if storage were exhausted.
#[derive(Default)]
pub struct FailingLogStore;

impl LocalLogStore for FailingLogStore {
    fn append(&self, _record: &InteractionRecord) -> Result<(), StoreError> {
        Err(StoreError::QuotaExceeded("storage full".to_string()))
    }

    fn read_all(&self) -> Vec<InteractionRecord> {
        Vec::new()
    }

    fn remove_many(&self, _ids: &[RecordId]) -> Result<usize, StoreError> {
        Err(StoreError::QuotaExceeded("storage full".to_string()))
    }

    fn clear(&self) -> Result<usize, StoreError> {
        Err(StoreError::QuotaExceeded("storage full".to_string()))
    }
}

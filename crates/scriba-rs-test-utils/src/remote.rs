use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use scriba_rs_protocol::{
    InteractionFilter, InteractionRecord, ListOptions, NewInteraction, RecordId, sort_records,
};
use scriba_rs_remote::{RemoteError, RemotePage, RemoteQuery, RemoteStore, WipeConfirmation};
use std::collections::HashSet;
use uuid::Uuid;

/// Call counters for [`StubRemote`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteCalls {
    pub insert: usize,
    pub insert_batch: usize,
    pub query: usize,
    pub count: usize,
    pub ensure_schema: usize,
}

#[derive(Default)]
struct StubState {
    records: Vec<InteractionRecord>,
    offline: bool,
    schema_missing: bool,
    bootstrap_supported: bool,
    failing_batches: HashSet<usize>,
    omit_totals: bool,
    max_rows: Option<usize>,
    calls: RemoteCalls,
}

/// In-memory remote store with failure injection.
#[derive(Default)]
pub struct StubRemote {
    state: Mutex<StubState>,
}

impl StubRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with remote-confirmed records.
    pub fn with_records(records: Vec<InteractionRecord>) -> Self {
        let stub = Self::default();
        stub.state.lock().records = records;
        stub
    }

    /// Every call fails with `Unavailable` while offline.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Table missing until `ensure_schema` runs; bootstrap succeeds only when supported.
    pub fn set_schema_missing(&self, missing: bool, bootstrap_supported: bool) {
        let mut state = self.state.lock();
        state.schema_missing = missing;
        state.bootstrap_supported = bootstrap_supported;
    }

    /// Fail the `index`-th call (zero-based) to `insert_batch`.
    pub fn fail_batch_call(&self, index: usize) {
        self.state.lock().failing_batches.insert(index);
    }

    /// Report pages without an exact total, like the listing procedure.
    pub fn omit_totals(&self) {
        self.state.lock().omit_totals = true;
    }

    /// Return at most `max_rows` rows per page, like a server-side row cap.
    pub fn cap_rows(&self, max_rows: usize) {
        self.state.lock().max_rows = Some(max_rows);
    }

    pub fn records(&self) -> Vec<InteractionRecord> {
        self.state.lock().records.clone()
    }

    pub fn calls(&self) -> RemoteCalls {
        self.state.lock().calls
    }

    fn check_reachable(state: &StubState) -> Result<(), RemoteError> {
        if state.offline {
            return Err(RemoteError::Unavailable("connection refused".to_string()));
        }
        if state.schema_missing {
            return Err(RemoteError::RelationMissing(
                "relation \"public.ai_interactions\" does not exist".to_string(),
            ));
        }
        Ok(())
    }

    fn stored(input: &NewInteraction) -> InteractionRecord {
        InteractionRecord::from_new(
            RecordId::new(Uuid::new_v4().to_string()),
            Utc::now(),
            input.clone(),
        )
    }
}

#[async_trait]
impl RemoteStore for StubRemote {
    async fn insert(&self, input: &NewInteraction) -> Result<InteractionRecord, RemoteError> {
        let mut state = self.state.lock();
        state.calls.insert += 1;
        Self::check_reachable(&state)?;
        let record = Self::stored(input);
        state.records.push(record.clone());
        Ok(record)
    }

    async fn insert_batch(
        &self,
        inputs: &[NewInteraction],
    ) -> Result<Vec<InteractionRecord>, RemoteError> {
        let mut state = self.state.lock();
        let index = state.calls.insert_batch;
        state.calls.insert_batch += 1;
        Self::check_reachable(&state)?;
        if state.failing_batches.contains(&index) {
            return Err(RemoteError::Api {
                status: 413,
                code: None,
                message: format!("batch {index} rejected"),
            });
        }
        let records: Vec<InteractionRecord> = inputs.iter().map(Self::stored).collect();
        state.records.extend(records.iter().cloned());
        Ok(records)
    }

    async fn query(&self, query: &RemoteQuery) -> Result<RemotePage, RemoteError> {
        let mut state = self.state.lock();
        state.calls.query += 1;
        Self::check_reachable(&state)?;
        let options = ListOptions {
            filter: query.filter.clone(),
            sort_by: query.sort_by,
            direction: query.direction,
            offset: query.offset,
            limit: query.limit,
        };
        let mut matching: Vec<InteractionRecord> = state
            .records
            .iter()
            .filter(|record| query.filter.matches(record))
            .cloned()
            .collect();
        sort_records(&mut matching, &options);
        let total = (!state.omit_totals && query.count_total).then_some(matching.len());
        let limit = state.max_rows.map_or(query.limit, |cap| cap.min(query.limit));
        let records = matching
            .into_iter()
            .skip(query.offset)
            .take(limit)
            .collect();
        Ok(RemotePage { records, total })
    }

    async fn count(&self, filter: &InteractionFilter) -> Result<usize, RemoteError> {
        let mut state = self.state.lock();
        state.calls.count += 1;
        Self::check_reachable(&state)?;
        Ok(state
            .records
            .iter()
            .filter(|record| filter.matches(record))
            .count())
    }

    async fn get(&self, id: &RecordId) -> Result<Option<InteractionRecord>, RemoteError> {
        let state = self.state.lock();
        Self::check_reachable(&state)?;
        Ok(state.records.iter().find(|record| &record.id == id).cloned())
    }

    async fn delete_by_id(&self, id: &RecordId) -> Result<bool, RemoteError> {
        let mut state = self.state.lock();
        Self::check_reachable(&state)?;
        let before = state.records.len();
        state.records.retain(|record| &record.id != id);
        Ok(state.records.len() < before)
    }

    async fn delete_all(&self, _confirmation: WipeConfirmation) -> Result<usize, RemoteError> {
        let mut state = self.state.lock();
        Self::check_reachable(&state)?;
        let removed = state.records.len();
        state.records.clear();
        Ok(removed)
    }

    async fn table_exists(&self, _table: &str) -> Result<bool, RemoteError> {
        let state = self.state.lock();
        if state.offline {
            return Err(RemoteError::Unavailable("connection refused".to_string()));
        }
        Ok(!state.schema_missing)
    }

    async fn ensure_schema(&self) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.calls.ensure_schema += 1;
        if state.offline {
            return Err(RemoteError::Unavailable("connection refused".to_string()));
        }
        if !state.bootstrap_supported {
            return Err(RemoteError::ProcedureMissing("exec_sql".to_string()));
        }
        state.schema_missing = false;
        Ok(())
    }
}

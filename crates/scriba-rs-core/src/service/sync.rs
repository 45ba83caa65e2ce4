use super::InteractionLog;
use crate::error::InteractionError;
use chrono::Utc;
use log::{info, warn};
use scriba_rs_protocol::{
    BatchError, InteractionRecord, META_ORIGINAL_LOCAL_ID, META_STORED_LOCALLY, META_SYNCED_AT,
    NewInteraction, RecordId, SyncSummary, set_metadata_entry,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

impl InteractionLog {
    /// Push local-only records to the remote store in batches.
    ///
    /// A failed batch is recorded and the loop moves on. Records are evicted
    /// locally only once the remote store confirms them. `cancel` is checked
    /// between batches.
    pub async fn sync_local_interactions(
        &self,
        cancel: &CancellationToken,
    ) -> Result<SyncSummary, InteractionError> {
        let store = self.require_remote("sync")?;
        let pending = self.local_only();
        if pending.is_empty() {
            info!("no local interactions to sync");
            return Ok(SyncSummary::default());
        }

        let batch_size = self.settings.batch_size;
        info!(
            "syncing local interactions (pending={}, batch_size={})",
            pending.len(),
            batch_size
        );
        let mut summary = SyncSummary::default();
        for (index, batch) in pending.chunks(batch_size).enumerate() {
            if cancel.is_cancelled() {
                warn!("sync cancelled (batch={})", index);
                summary.cancelled = true;
                break;
            }
            let synced_at = Utc::now().to_rfc3339();
            let inputs: Vec<NewInteraction> = batch
                .iter()
                .map(|record| sync_input(record, &synced_at))
                .collect();
            let batch_ids: Vec<RecordId> = batch.iter().map(|record| record.id.clone()).collect();

            let inserted = match store.insert_batch(&inputs).await {
                Ok(inserted) => inserted,
                Err(err) => {
                    warn!(
                        "sync batch failed (batch={}, records={}, error={})",
                        index,
                        batch.len(),
                        err
                    );
                    summary.errors.push(BatchError {
                        batch: index,
                        record_ids: batch_ids,
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            let confirmed: Vec<RecordId> = inserted
                .iter()
                .filter_map(InteractionRecord::original_local_id)
                .map(RecordId::from)
                .filter(|id| batch_ids.contains(id))
                .collect();
            match self.local.remove_many(&confirmed) {
                Ok(removed) => {
                    info!(
                        "sync batch confirmed (batch={}, confirmed={}, evicted={})",
                        index,
                        confirmed.len(),
                        removed
                    );
                    summary.synced += removed;
                }
                Err(err) => {
                    warn!(
                        "sync batch confirmed but local eviction failed (batch={}, error={})",
                        index, err
                    );
                    summary.errors.push(BatchError {
                        batch: index,
                        record_ids: confirmed,
                        message: format!("confirmed remotely but not evicted locally: {err}"),
                    });
                }
            }
        }

        summary.remaining = self.local_only().len();
        info!(
            "sync finished (synced={}, failed_batches={}, remaining={}, cancelled={})",
            summary.synced,
            summary.errors.len(),
            summary.remaining,
            summary.cancelled
        );
        Ok(summary)
    }
}

/// Remote write input for a local record, pointing back at its local id.
fn sync_input(record: &InteractionRecord, synced_at: &str) -> NewInteraction {
    let mut metadata = record.metadata.clone();
    set_metadata_entry(
        &mut metadata,
        META_ORIGINAL_LOCAL_ID,
        Value::String(record.id.to_string()),
    );
    set_metadata_entry(
        &mut metadata,
        META_SYNCED_AT,
        Value::String(synced_at.to_string()),
    );
    set_metadata_entry(&mut metadata, META_STORED_LOCALLY, Value::Bool(false));
    NewInteraction {
        prompt: record.prompt.clone(),
        response: record.response.clone(),
        model: record.model.clone(),
        interaction_type: record.interaction_type,
        metadata,
        relations: record.relations(),
    }
}

//! Interaction log service over the local and remote stores.

mod read;
mod sync;

use crate::confirm::Confirm;
use crate::error::InteractionError;
use crate::export::render_export;
use crate::settings::LogSettings;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use scriba_rs_protocol::{
    ClearOptions, ClearReport, ClearStatus, DeleteOutcome, ExportDocument, ExportFormat,
    InteractionRecord, ListOptions, LogStatus, META_STORED_LOCALLY, META_TIMESTAMP,
    NewInteraction, RecordId, RecordSource, Recorded, set_metadata_entry,
};
use scriba_rs_remote::{
    INTERACTIONS_TABLE, RemoteClient, RemoteError, RemoteStore, WipeConfirmation,
};
use scriba_rs_store::LocalLogStore;
use serde_json::Value;
use std::sync::Arc;

/// Single logical interaction history backed by a remote and a local store.
///
/// Writes go to the remote store when it is ready and fall back to the local
/// store otherwise. Reads merge remote records with local-only records, and
/// sync pushes local-only records to the remote store.
pub struct InteractionLog {
    local: Arc<dyn LocalLogStore>,
    remote: RemoteClient,
    settings: LogSettings,
}

impl InteractionLog {
    pub fn new(local: Arc<dyn LocalLogStore>, remote: RemoteClient, settings: LogSettings) -> Self {
        Self {
            local,
            remote,
            settings,
        }
    }

    pub fn remote(&self) -> &RemoteClient {
        &self.remote
    }

    pub fn local(&self) -> &Arc<dyn LocalLogStore> {
        &self.local
    }

    pub fn settings(&self) -> &LogSettings {
        &self.settings
    }

    /// Ready remote store, restoring persisted credentials on first use.
    fn remote_store(&self) -> Option<Arc<dyn RemoteStore>> {
        if !self.remote.is_ready() && !self.remote.restore() {
            return None;
        }
        self.remote.store().ok()
    }

    fn require_remote(&self, operation: &str) -> Result<Arc<dyn RemoteStore>, InteractionError> {
        self.remote_store().ok_or_else(|| {
            InteractionError::Configuration(format!("remote store required for {operation}"))
        })
    }

    /// Record an interaction, falling back to the local store when the
    /// remote write is impossible.
    ///
    /// Only fails when neither store accepts the record.
    pub async fn record_interaction(
        &self,
        input: NewInteraction,
    ) -> Result<Recorded, InteractionError> {
        let now = Utc::now();
        let remote_error = match self.remote_store() {
            Some(store) => {
                let remote_input = tagged(input.clone(), false, now);
                match self.insert_remote(store.as_ref(), &remote_input).await {
                    Ok(record) => {
                        info!(
                            "interaction recorded remotely (id={}, type={})",
                            record.id, record.interaction_type
                        );
                        return Ok(Recorded {
                            record,
                            source: RecordSource::Remote,
                            remote_error: None,
                        });
                    }
                    Err(err) => {
                        warn!("remote write failed; recording locally (error={})", err);
                        Some(err.to_string())
                    }
                }
            }
            None => {
                debug!("remote store not ready; recording locally");
                None
            }
        };

        let record =
            InteractionRecord::from_new(RecordId::new_local(), now, tagged(input, true, now));
        match self.local.append(&record) {
            Ok(()) => {
                info!(
                    "interaction recorded locally (id={}, type={})",
                    record.id, record.interaction_type
                );
                Ok(Recorded {
                    record,
                    source: RecordSource::Local,
                    remote_error,
                })
            }
            Err(err) => {
                error!(
                    "interaction could not be persisted (id={}, error={})",
                    record.id, err
                );
                Err(InteractionError::Unpersisted {
                    record: Box::new(record),
                    remote: remote_error
                        .unwrap_or_else(|| RemoteError::NotConfigured.to_string()),
                    local: err,
                })
            }
        }
    }

    /// Insert remotely, bootstrapping the schema and retrying once when allowed.
    async fn insert_remote(
        &self,
        store: &dyn RemoteStore,
        input: &NewInteraction,
    ) -> Result<InteractionRecord, RemoteError> {
        match store.insert(input).await {
            Err(err) if err.is_schema_missing() && self.settings.auto_create_schema => {
                info!("remote schema missing; bootstrapping (error={})", err);
                store.ensure_schema().await?;
                store.insert(input).await
            }
            result => result,
        }
    }

    /// Look up a record in the store owning its id space.
    pub async fn get_interaction(
        &self,
        id: &RecordId,
    ) -> Result<Option<InteractionRecord>, InteractionError> {
        if id.is_local() {
            return Ok(self.local.get(id));
        }
        let store = self.require_remote("lookup")?;
        Ok(store.get(id).await?)
    }

    /// Delete a record from the store owning its id space.
    ///
    /// Deleting an unknown id reports `NotFound` rather than an error.
    pub async fn delete_interaction(
        &self,
        id: &RecordId,
    ) -> Result<DeleteOutcome, InteractionError> {
        let deleted = if id.is_local() {
            self.local.remove(id)?
        } else {
            let store = self.require_remote("delete")?;
            store.delete_by_id(id).await?
        };
        let outcome = if deleted {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::NotFound
        };
        info!("interaction delete finished (id={}, outcome={:?})", id, outcome);
        Ok(outcome)
    }

    /// Clear the requested sides; each side reports independently.
    ///
    /// The remote wipe runs only after `confirm` agrees.
    pub async fn clear_all_interactions(
        &self,
        options: ClearOptions,
        confirm: &dyn Confirm,
    ) -> ClearReport {
        let local = if options.local {
            match self.local.clear() {
                Ok(removed) => ClearStatus::Cleared { removed },
                Err(err) => ClearStatus::Failed {
                    message: err.to_string(),
                },
            }
        } else {
            ClearStatus::Skipped
        };
        let remote = if options.remote {
            self.clear_remote(confirm).await
        } else {
            ClearStatus::Skipped
        };
        info!("clear finished (local={:?}, remote={:?})", local, remote);
        ClearReport { local, remote }
    }

    async fn clear_remote(&self, confirm: &dyn Confirm) -> ClearStatus {
        let store = match self.require_remote("clear") {
            Ok(store) => store,
            Err(err) => {
                return ClearStatus::Failed {
                    message: err.to_string(),
                };
            }
        };
        let message = format!("Permanently delete every record in {INTERACTIONS_TABLE}?");
        if !confirm.confirm(&message).await {
            info!("remote clear declined");
            return ClearStatus::Cancelled;
        }
        let Some(confirmation) = WipeConfirmation::for_table(INTERACTIONS_TABLE) else {
            return ClearStatus::Failed {
                message: format!("wipe not permitted for {INTERACTIONS_TABLE}"),
            };
        };
        match store.delete_all(confirmation).await {
            Ok(removed) => ClearStatus::Cleared { removed },
            Err(err) => ClearStatus::Failed {
                message: err.to_string(),
            },
        }
    }

    /// Render the listing described by `options` as a document.
    pub async fn export_interactions(
        &self,
        format: ExportFormat,
        options: &ListOptions,
    ) -> Result<ExportDocument, InteractionError> {
        let listing = self.list_interactions(options).await?;
        let document = render_export(&listing.records, format, Utc::now().date_naive())?;
        info!(
            "interactions exported (format={}, records={}, source={})",
            format.extension(),
            document.record_count,
            listing.source
        );
        Ok(document)
    }

    /// Create the remote table and procedures; returns whether the table
    /// already existed.
    pub async fn ensure_remote_schema(&self) -> Result<bool, InteractionError> {
        let store = self.require_remote("schema bootstrap")?;
        let existed = store.table_exists(INTERACTIONS_TABLE).await?;
        store.ensure_schema().await?;
        info!("remote schema ensured (table_existed={})", existed);
        Ok(existed)
    }

    pub fn status(&self) -> LogStatus {
        LogStatus {
            remote_ready: self.remote_store().is_some(),
            local_pending: self.local_only().len(),
        }
    }

    fn local_only(&self) -> Vec<InteractionRecord> {
        self.local
            .read_all()
            .into_iter()
            .filter(InteractionRecord::is_local_only)
            .collect()
    }
}

/// Write input tagged with the storage flag and write timestamp.
fn tagged(mut input: NewInteraction, stored_locally: bool, now: DateTime<Utc>) -> NewInteraction {
    set_metadata_entry(
        &mut input.metadata,
        META_STORED_LOCALLY,
        Value::Bool(stored_locally),
    );
    set_metadata_entry(
        &mut input.metadata,
        META_TIMESTAMP,
        Value::String(now.to_rfc3339()),
    );
    input
}

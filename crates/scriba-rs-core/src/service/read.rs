use super::InteractionLog;
use crate::error::InteractionError;
use log::{debug, warn};
use scriba_rs_config::MergePagination;
use scriba_rs_protocol::{
    InteractionRecord, ListOptions, ListResult, RecordSource, sort_records,
};
use scriba_rs_remote::{RemoteError, RemoteQuery, RemoteStore};
use std::collections::HashSet;

impl InteractionLog {
    /// List interactions across both stores.
    ///
    /// Falls back to the local store alone when the remote store is not
    /// ready or fails, so remote trouble never fails a read.
    pub async fn list_interactions(
        &self,
        options: &ListOptions,
    ) -> Result<ListResult, InteractionError> {
        let local = self.local.read_all();
        let Some(store) = self.remote_store() else {
            debug!("remote store not ready; listing local records");
            return Ok(local_listing(local, options));
        };

        let local_only: Vec<InteractionRecord> = local
            .iter()
            .filter(|record| record.is_local_only() && options.filter.matches(record))
            .cloned()
            .collect();
        match self.list_with_remote(store.as_ref(), options, local_only).await {
            Ok(result) => {
                debug!(
                    "listed interactions (source={}, returned={}, total={})",
                    result.source,
                    result.records.len(),
                    result.total
                );
                Ok(result)
            }
            Err(err) => {
                warn!("remote listing failed; listing local records (error={})", err);
                Ok(local_listing(local, options))
            }
        }
    }

    async fn list_with_remote(
        &self,
        store: &dyn RemoteStore,
        options: &ListOptions,
        local_only: Vec<InteractionRecord>,
    ) -> Result<ListResult, RemoteError> {
        if local_only.is_empty() {
            return self.remote_listing(store, options).await;
        }
        match self.settings.merge_pagination {
            MergePagination::Exact => self.merge_exact(store, options, local_only).await,
            MergePagination::Approximate => {
                self.merge_approximate(store, options, local_only).await
            }
        }
    }

    /// Remote page as-is, re-sorted so ordering does not depend on the store.
    async fn remote_listing(
        &self,
        store: &dyn RemoteStore,
        options: &ListOptions,
    ) -> Result<ListResult, RemoteError> {
        let page = store.query(&RemoteQuery::from_options(options)).await?;
        let total = match page.total {
            Some(total) => total,
            None => store.count(&options.filter).await?,
        };
        let mut records = page.records;
        sort_records(&mut records, options);
        Ok(ListResult {
            records,
            source: RecordSource::Remote,
            total,
        })
    }

    /// Every matching record from both sides, merged before slicing.
    async fn merge_exact(
        &self,
        store: &dyn RemoteStore,
        options: &ListOptions,
        local_only: Vec<InteractionRecord>,
    ) -> Result<ListResult, RemoteError> {
        let mut combined = self.fetch_all_remote(store, options).await?;
        let local = without_synced(local_only, &combined);
        let source = if local.is_empty() {
            RecordSource::Remote
        } else {
            RecordSource::Merged
        };
        combined.extend(local);
        sort_records(&mut combined, options);
        let total = combined.len();
        Ok(ListResult {
            records: paginate(combined, options),
            source,
            total,
        })
    }

    /// One remote page plus every local match, truncated to the page size.
    ///
    /// Local records are not offset, so later pages may repeat them.
    async fn merge_approximate(
        &self,
        store: &dyn RemoteStore,
        options: &ListOptions,
        local_only: Vec<InteractionRecord>,
    ) -> Result<ListResult, RemoteError> {
        let page = store.query(&RemoteQuery::from_options(options)).await?;
        let remote_total = match page.total {
            Some(total) => total,
            None => store.count(&options.filter).await?,
        };
        let local = without_synced(local_only, &page.records);
        let source = if local.is_empty() {
            RecordSource::Remote
        } else {
            RecordSource::Merged
        };
        let total = remote_total + local.len();
        let mut combined = page.records;
        combined.extend(local);
        sort_records(&mut combined, options);
        combined.truncate(options.limit);
        Ok(ListResult {
            records: combined,
            source,
            total,
        })
    }

    /// Pull every matching remote record in chunks.
    ///
    /// Stops at the first empty page; the server may return fewer rows than
    /// asked for before the end.
    async fn fetch_all_remote(
        &self,
        store: &dyn RemoteStore,
        options: &ListOptions,
    ) -> Result<Vec<InteractionRecord>, RemoteError> {
        let chunk = self.settings.remote_chunk_size;
        let mut query = RemoteQuery::from_options(options);
        query.count_total = false;
        let mut records = Vec::new();
        loop {
            let page = store.query(&query.window(records.len(), chunk)).await?;
            if page.records.is_empty() {
                break;
            }
            records.extend(page.records);
        }
        debug!("fetched remote records (count={}, chunk={})", records.len(), chunk);
        Ok(records)
    }
}

fn local_listing(records: Vec<InteractionRecord>, options: &ListOptions) -> ListResult {
    let mut matching: Vec<InteractionRecord> = records
        .into_iter()
        .filter(|record| options.filter.matches(record))
        .collect();
    sort_records(&mut matching, options);
    let total = matching.len();
    ListResult {
        records: paginate(matching, options),
        source: RecordSource::Local,
        total,
    }
}

/// Drop local records already present remotely under their synced copy.
fn without_synced(
    local: Vec<InteractionRecord>,
    remote: &[InteractionRecord],
) -> Vec<InteractionRecord> {
    let synced: HashSet<&str> = remote
        .iter()
        .filter_map(InteractionRecord::original_local_id)
        .collect();
    if synced.is_empty() {
        return local;
    }
    local
        .into_iter()
        .filter(|record| !synced.contains(record.id.as_str()))
        .collect()
}

fn paginate(records: Vec<InteractionRecord>, options: &ListOptions) -> Vec<InteractionRecord> {
    records
        .into_iter()
        .skip(options.offset)
        .take(options.limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::LogSettings;
    use pretty_assertions::assert_eq;
    use scriba_rs_protocol::{
        InteractionFilter, InteractionType, META_ORIGINAL_LOCAL_ID, SortDirection, SortKey,
    };
    use scriba_rs_remote::RemoteClient;
    use scriba_rs_test_utils::{MemoryLogStore, StubRemote, local_record, remote_record};
    use serde_json::Value;
    use std::sync::Arc;

    fn log_over(
        remote: Arc<StubRemote>,
        local: Vec<InteractionRecord>,
        settings: LogSettings,
    ) -> InteractionLog {
        InteractionLog::new(
            Arc::new(MemoryLogStore::with_records(local)),
            RemoteClient::from_store(remote),
            settings,
        )
    }

    fn ids(result: &ListResult) -> Vec<String> {
        result
            .records
            .iter()
            .map(|record| record.id.to_string())
            .collect()
    }

    #[tokio::test]
    async fn remote_only_listing_uses_remote_total() {
        let remote = Arc::new(StubRemote::with_records(
            (0..5)
                .map(|index| remote_record(&format!("r-{index}"), index, InteractionType::PaperSearch))
                .collect(),
        ));
        let log = log_over(remote, Vec::new(), LogSettings::default());
        let result = log
            .list_interactions(&ListOptions::default().with_page(0, 2))
            .await
            .expect("list");
        assert_eq!(result.source, RecordSource::Remote);
        assert_eq!(result.total, 5);
        assert_eq!(ids(&result), vec!["r-4", "r-3"]);
    }

    #[tokio::test]
    async fn exact_merge_paginates_after_merging() {
        let remote = Arc::new(StubRemote::with_records(vec![
            remote_record("r-1", 10, InteractionType::PaperSearch),
            remote_record("r-2", 30, InteractionType::PaperSearch),
        ]));
        let local = local_record(20, InteractionType::PaperSearch);
        let log = log_over(
            remote,
            vec![local.clone()],
            LogSettings::default().with_remote_chunk_size(1),
        );

        let first = log
            .list_interactions(&ListOptions::default().with_page(0, 2))
            .await
            .expect("list");
        assert_eq!(first.source, RecordSource::Merged);
        assert_eq!(first.total, 3);
        assert_eq!(ids(&first), vec!["r-2".to_string(), local.id.to_string()]);

        let second = log
            .list_interactions(&ListOptions::default().with_page(2, 2))
            .await
            .expect("list");
        assert_eq!(ids(&second), vec!["r-1"]);
    }

    #[tokio::test]
    async fn approximate_merge_truncates_remote_page() {
        let remote = Arc::new(StubRemote::with_records(vec![
            remote_record("r-1", 10, InteractionType::PaperSearch),
            remote_record("r-2", 30, InteractionType::PaperSearch),
            remote_record("r-3", 40, InteractionType::PaperSearch),
        ]));
        let local = local_record(35, InteractionType::PaperSearch);
        let log = log_over(
            remote,
            vec![local.clone()],
            LogSettings::default().with_merge_pagination(MergePagination::Approximate),
        );

        let result = log
            .list_interactions(&ListOptions::default().with_page(0, 2))
            .await
            .expect("list");
        assert_eq!(result.source, RecordSource::Merged);
        assert_eq!(result.total, 4);
        assert_eq!(ids(&result), vec!["r-3".to_string(), local.id.to_string()]);
    }

    #[tokio::test]
    async fn merge_drops_local_records_already_synced() {
        let local = local_record(20, InteractionType::PaperSearch);
        let mut synced = remote_record("r-1", 25, InteractionType::PaperSearch);
        synced.set_metadata(
            META_ORIGINAL_LOCAL_ID,
            Value::String(local.id.to_string()),
        );
        let remote = Arc::new(StubRemote::with_records(vec![synced]));
        let log = log_over(remote, vec![local], LogSettings::default());

        let result = log
            .list_interactions(&ListOptions::default())
            .await
            .expect("list");
        assert_eq!(result.source, RecordSource::Remote);
        assert_eq!(result.total, 1);
        assert_eq!(ids(&result), vec!["r-1"]);
    }

    #[tokio::test]
    async fn offline_remote_serves_local_records() {
        let remote = Arc::new(StubRemote::with_records(vec![remote_record(
            "r-1",
            1,
            InteractionType::PaperSearch,
        )]));
        remote.set_offline(true);
        let log = log_over(
            remote,
            vec![
                local_record(1, InteractionType::PaperSearch),
                local_record(2, InteractionType::TextAnalysis),
            ],
            LogSettings::default(),
        );
        let options = ListOptions::default().with_filter(InteractionFilter {
            interaction_type: Some(InteractionType::TextAnalysis),
            ..InteractionFilter::default()
        });
        let result = log.list_interactions(&options).await.expect("list");
        assert_eq!(result.source, RecordSource::Local);
        assert_eq!(result.total, 1);
    }

    /// Listings without a server count still report a usable total.
    #[tokio::test]
    async fn missing_remote_total_is_computed() {
        let remote = Arc::new(StubRemote::with_records(
            (0..3)
                .map(|index| remote_record(&format!("r-{index}"), index, InteractionType::PaperSearch))
                .collect(),
        ));
        remote.omit_totals();
        let log = log_over(remote, Vec::new(), LogSettings::default());

        let short_page = log
            .list_interactions(&ListOptions::default().with_page(0, 10))
            .await
            .expect("list");
        assert_eq!(short_page.total, 3);

        let full_page = log
            .list_interactions(&ListOptions::default().with_page(0, 2))
            .await
            .expect("list");
        assert_eq!(full_page.total, 3);
    }

    /// A remote-only page without a total costs one query plus one count.
    #[tokio::test]
    async fn remote_only_listing_counts_without_fetching_everything() {
        let remote = Arc::new(StubRemote::with_records(
            (0..20)
                .map(|index| remote_record(&format!("r-{index:02}"), index, InteractionType::PaperSearch))
                .collect(),
        ));
        remote.omit_totals();
        let log = log_over(remote.clone(), Vec::new(), LogSettings::default());

        let result = log
            .list_interactions(&ListOptions::default().with_page(0, 5))
            .await
            .expect("list");
        assert_eq!(result.total, 20);
        assert_eq!(result.records.len(), 5);
        assert_eq!(remote.calls().query, 1);
        assert_eq!(remote.calls().count, 1);
    }

    #[tokio::test]
    async fn exact_merge_survives_server_row_cap() {
        let remote = Arc::new(StubRemote::with_records(
            (0..7)
                .map(|index| remote_record(&format!("r-{index}"), index * 10, InteractionType::PaperSearch))
                .collect(),
        ));
        remote.cap_rows(3);
        let local = local_record(15, InteractionType::PaperSearch);
        let log = log_over(remote, vec![local], LogSettings::default());

        let result = log
            .list_interactions(&ListOptions::default().with_page(0, 50))
            .await
            .expect("list");
        assert_eq!(result.source, RecordSource::Merged);
        assert_eq!(result.total, 8);
        assert_eq!(result.records.len(), 8);
    }

    #[tokio::test]
    async fn sort_ties_break_on_id() {
        let remote = Arc::new(StubRemote::with_records(vec![
            remote_record("r-b", 5, InteractionType::PaperSearch),
            remote_record("r-a", 5, InteractionType::PaperSearch),
        ]));
        let log = log_over(
            remote,
            vec![local_record(5, InteractionType::PaperSearch)],
            LogSettings::default(),
        );
        let options =
            ListOptions::default().with_sort(SortKey::InteractionType, SortDirection::Asc);
        let first = log.list_interactions(&options).await.expect("list");
        let second = log.list_interactions(&options).await.expect("list");
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(first.records.len(), 3);
        assert_eq!(first.records[1].id.as_str(), "r-a");
    }
}

//! Service settings derived from configuration.

use scriba_rs_config::{MergePagination, ScribaConfig};
use scriba_rs_protocol::ListOptions;

/// Tunables for [`crate::InteractionLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Records per sync batch.
    pub batch_size: usize,
    /// Bootstrap the remote schema once when a write finds it missing.
    pub auto_create_schema: bool,
    /// How merged listings are paginated.
    pub merge_pagination: MergePagination,
    /// Page size used when pulling every remote match in exact mode.
    pub remote_chunk_size: usize,
    /// Listing defaults for callers that do not choose their own.
    pub default_list: ListOptions,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self::from_config(&ScribaConfig::default())
    }
}

impl LogSettings {
    pub fn from_config(config: &ScribaConfig) -> Self {
        Self {
            batch_size: config.sync.batch_size.max(1),
            auto_create_schema: config.remote.auto_create_schema,
            merge_pagination: config.list.merge_pagination,
            remote_chunk_size: config.list.remote_chunk_size.max(1),
            default_list: ListOptions::default()
                .with_sort(config.list.sort_by, config.list.sort_direction)
                .with_page(0, config.list.page_size),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_merge_pagination(mut self, mode: MergePagination) -> Self {
        self.merge_pagination = mode;
        self
    }

    pub fn with_auto_create_schema(mut self, enabled: bool) -> Self {
        self.auto_create_schema = enabled;
        self
    }

    pub fn with_remote_chunk_size(mut self, chunk: usize) -> Self {
        self.remote_chunk_size = chunk.max(1);
        self
    }
}

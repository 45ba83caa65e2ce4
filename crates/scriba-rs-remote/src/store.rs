//! Remote store interface and request types.

use crate::error::RemoteError;
use async_trait::async_trait;
use scriba_rs_protocol::{
    InteractionFilter, InteractionRecord, ListOptions, NewInteraction, RecordId, SortDirection,
    SortKey,
};

/// Name of the remote interactions table.
pub const INTERACTIONS_TABLE: &str = "ai_interactions";

/// Filtered, sorted, paginated remote query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteQuery {
    pub filter: InteractionFilter,
    pub sort_by: SortKey,
    pub direction: SortDirection,
    pub offset: usize,
    pub limit: usize,
    /// Ask the store for the exact number of matching rows.
    pub count_total: bool,
}

impl RemoteQuery {
    /// Query for the page described by listing options.
    pub fn from_options(options: &ListOptions) -> Self {
        Self {
            filter: options.filter.clone(),
            sort_by: options.sort_by,
            direction: options.direction,
            offset: options.offset,
            limit: options.limit,
            count_total: true,
        }
    }

    /// Same query at another window.
    pub fn window(&self, offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit,
            ..self.clone()
        }
    }

    /// True when the order matches the fixed order of the listing procedure.
    pub fn is_default_order(&self) -> bool {
        self.sort_by == SortKey::CreatedAt && self.direction == SortDirection::Desc
    }
}

/// One page of remote records.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemotePage {
    pub records: Vec<InteractionRecord>,
    /// Exact number of matching rows, when the store reported it.
    pub total: Option<usize>,
}

/// Proof that the caller explicitly confirmed an irreversible wipe.
///
/// Only obtainable by naming the table that is about to be emptied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WipeConfirmation {
    table: &'static str,
}

impl WipeConfirmation {
    /// Confirm a wipe of `table`; `None` unless it names the interactions table.
    pub fn for_table(table: &str) -> Option<Self> {
        (table == INTERACTIONS_TABLE).then_some(Self {
            table: INTERACTIONS_TABLE,
        })
    }

    pub fn table(&self) -> &str {
        self.table
    }
}

#[async_trait]
/// Remote relational store holding confirmed interaction records.
pub trait RemoteStore: Send + Sync {
    /// Insert a single interaction and return the stored row.
    async fn insert(&self, input: &NewInteraction) -> Result<InteractionRecord, RemoteError>;

    /// Insert several interactions in one request; all or nothing.
    async fn insert_batch(
        &self,
        inputs: &[NewInteraction],
    ) -> Result<Vec<InteractionRecord>, RemoteError>;

    /// Fetch one page of matching records.
    async fn query(&self, query: &RemoteQuery) -> Result<RemotePage, RemoteError>;

    /// Exact number of records matching `filter`.
    async fn count(&self, filter: &InteractionFilter) -> Result<usize, RemoteError>;

    /// Fetch a record by id.
    async fn get(&self, id: &RecordId) -> Result<Option<InteractionRecord>, RemoteError>;

    /// Delete a record by id; `false` when no row matched.
    async fn delete_by_id(&self, id: &RecordId) -> Result<bool, RemoteError>;

    /// Delete every record; returns the number of rows removed.
    async fn delete_all(&self, confirmation: WipeConfirmation) -> Result<usize, RemoteError>;

    /// Check whether a table exists.
    async fn table_exists(&self, table: &str) -> Result<bool, RemoteError>;

    /// Create the table, indexes, and procedures when missing.
    async fn ensure_schema(&self) -> Result<(), RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn wipe_confirmation_requires_table_name() {
        assert_eq!(WipeConfirmation::for_table("interactions"), None);
        let confirmation = WipeConfirmation::for_table(INTERACTIONS_TABLE).expect("confirm");
        assert_eq!(confirmation.table(), INTERACTIONS_TABLE);
    }

    #[test]
    fn default_order_detection() {
        let options = ListOptions::default();
        let query = RemoteQuery::from_options(&options);
        assert!(query.is_default_order());
        let query = RemoteQuery::from_options(
            &options.with_sort(SortKey::Model, SortDirection::Desc),
        );
        assert!(!query.is_default_order());
    }
}

//! Result types returned by interaction log operations.

use crate::{InteractionRecord, ParseError, RecordId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which store(s) produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    /// Local log store only.
    Local,
    /// Remote store only.
    Remote,
    /// Remote records merged with local-only records.
    Merged,
}

impl fmt::Display for RecordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecordSource::Local => "local",
            RecordSource::Remote => "remote",
            RecordSource::Merged => "merged",
        };
        f.write_str(label)
    }
}

/// Page of records returned by a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResult {
    pub records: Vec<InteractionRecord>,
    pub source: RecordSource,
    /// Number of matching records across every page.
    pub total: usize,
}

/// Outcome of a successful write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recorded {
    /// Record as persisted.
    pub record: InteractionRecord,
    /// Store that accepted the write.
    pub source: RecordSource,
    /// Remote failure that caused the local fallback, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_error: Option<String>,
}

impl Recorded {
    /// True when the write landed in the local store.
    pub fn is_local(&self) -> bool {
        self.source == RecordSource::Local
    }
}

/// Failure of a single sync batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    /// Zero-based batch index.
    pub batch: usize,
    /// Local ids contained in the batch.
    pub record_ids: Vec<RecordId>,
    pub message: String,
}

/// Summary of a sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Local records confirmed remotely and evicted.
    pub synced: usize,
    pub errors: Vec<BatchError>,
    /// Local-only records still held after the run.
    pub remaining: usize,
    /// True when the run stopped early on cancellation.
    pub cancelled: bool,
}

impl SyncSummary {
    /// True when every batch succeeded and nothing remains locally.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty() && !self.cancelled && self.remaining == 0
    }
}

/// Outcome of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Which sides a clear request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearOptions {
    pub local: bool,
    pub remote: bool,
}

impl Default for ClearOptions {
    fn default() -> Self {
        Self {
            local: true,
            remote: false,
        }
    }
}

/// Per-side status of a clear request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ClearStatus {
    /// Side was not requested.
    Skipped,
    /// Side was cleared; `removed` is the number of records removed.
    Cleared { removed: usize },
    /// Confirmation was declined.
    Cancelled,
    /// Clearing failed.
    Failed { message: String },
}

/// Independent report for each side of a clear request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearReport {
    pub local: ClearStatus,
    pub remote: ClearStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(ParseError::ExportFormat(value.to_string())),
        }
    }
}

/// Rendered export ready to be written to a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub content: String,
    pub filename: String,
    pub mime_type: String,
    pub record_count: usize,
}

/// Snapshot of the log's storage state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStatus {
    /// True when the remote client holds a usable connection.
    pub remote_ready: bool,
    /// Number of local-only records awaiting sync.
    pub local_pending: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn clear_status_serializes_with_tag() {
        let report = ClearReport {
            local: ClearStatus::Cleared { removed: 3 },
            remote: ClearStatus::Cancelled,
        };
        let value = serde_json::to_value(&report).expect("serialize");
        assert_eq!(
            value,
            json!({
                "local": { "status": "cleared", "removed": 3 },
                "remote": { "status": "cancelled" },
            })
        );
    }

    #[test]
    fn sync_summary_completion() {
        let mut summary = SyncSummary {
            synced: 2,
            ..SyncSummary::default()
        };
        assert!(summary.is_complete());
        summary.errors.push(BatchError {
            batch: 1,
            record_ids: vec![RecordId::new("local-1")],
            message: "timeout".to_string(),
        });
        assert!(!summary.is_complete());
    }

    #[test]
    fn export_format_metadata() {
        assert_eq!("CSV".parse::<ExportFormat>(), Ok(ExportFormat::Csv));
        assert_eq!(ExportFormat::Json.extension(), "json");
        assert_eq!(ExportFormat::Csv.mime_type(), "text/csv");
    }
}

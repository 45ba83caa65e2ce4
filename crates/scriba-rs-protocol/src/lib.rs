//! Shared data model for Scriba interaction records, queries, and results.

mod outcome;
mod query;

pub use outcome::{
    BatchError, ClearOptions, ClearReport, ClearStatus, DeleteOutcome, ExportDocument,
    ExportFormat, ListResult, LogStatus, RecordSource, Recorded, SyncSummary,
};
pub use query::{InteractionFilter, ListOptions, SortDirection, SortKey, sort_records};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Prefix that marks identifiers generated by the local log store.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Metadata flag set on records that only exist in the local store.
pub const META_STORED_LOCALLY: &str = "stored_locally";
/// Metadata back-reference from a synced remote record to its local source.
pub const META_ORIGINAL_LOCAL_ID: &str = "original_local_id";
/// Metadata timestamp set when a local record is pushed to the remote store.
pub const META_SYNCED_AT: &str = "synced_at";
/// Metadata timestamp set on every write.
pub const META_TIMESTAMP: &str = "timestamp";

/// Errors produced while parsing protocol values from strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Value does not name a known interaction type.
    #[error("unknown interaction type: {0}")]
    InteractionType(String),
    /// Value does not name a sortable column.
    #[error("unknown sort key: {0}")]
    SortKey(String),
    /// Value is neither `asc` nor `desc`.
    #[error("unknown sort direction: {0}")]
    SortDirection(String),
    /// Value does not name an export format.
    #[error("unknown export format: {0}")]
    ExportFormat(String),
}

/// Identifier of an interaction record.
///
/// Remote ids are assigned by the remote store. Local ids carry the
/// [`LOCAL_ID_PREFIX`] so the two spaces never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh identifier in the local id space.
    pub fn new_local() -> Self {
        Self(format!("{LOCAL_ID_PREFIX}{}", Uuid::new_v4()))
    }

    /// True when the identifier belongs to the local id space.
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_ID_PREFIX)
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Category of an AI interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    /// Literature / paper search.
    PaperSearch,
    /// Free-form content generation.
    ContentGeneration,
    /// Analysis or summarization of supplied text.
    TextAnalysis,
}

impl InteractionType {
    /// All known interaction types.
    pub const ALL: [InteractionType; 3] = [
        InteractionType::PaperSearch,
        InteractionType::ContentGeneration,
        InteractionType::TextAnalysis,
    ];

    /// Wire name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::PaperSearch => "paper_search",
            InteractionType::ContentGeneration => "content_generation",
            InteractionType::TextAnalysis => "text_analysis",
        }
    }
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionType {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| ParseError::InteractionType(value.to_string()))
    }
}

/// Weak references from an interaction to project/task/document entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relations {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub document_id: Option<String>,
}

/// Input for recording a new interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInteraction {
    /// Prompt sent to the AI provider.
    pub prompt: String,
    /// Text returned by the AI provider.
    pub response: String,
    /// Model identifier.
    pub model: String,
    /// Interaction category.
    pub interaction_type: InteractionType,
    /// Caller-supplied metadata (object).
    #[serde(default = "empty_json_object")]
    pub metadata: Value,
    /// Optional relationship fields.
    #[serde(default, flatten)]
    pub relations: Relations,
}

impl NewInteraction {
    /// Build an interaction with empty metadata and no relations.
    pub fn new(
        prompt: impl Into<String>,
        response: impl Into<String>,
        model: impl Into<String>,
        interaction_type: InteractionType,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            response: response.into(),
            model: model.into(),
            interaction_type,
            metadata: empty_json_object(),
            relations: Relations::default(),
        }
    }

    /// Replace the metadata bag.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Replace the relationship fields.
    pub fn with_relations(mut self, relations: Relations) -> Self {
        self.relations = relations;
        self
    }
}

/// Persisted interaction record, shared by the local and remote stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: RecordId,
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub prompt: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub response: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub model: String,
    pub interaction_type: InteractionType,
    #[serde(default = "empty_json_object", deserialize_with = "null_as_object")]
    pub metadata: Value,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub document_id: Option<String>,
}

impl InteractionRecord {
    /// Build a record from write input with an explicit id and timestamp.
    pub fn from_new(id: RecordId, created_at: DateTime<Utc>, input: NewInteraction) -> Self {
        let NewInteraction {
            prompt,
            response,
            model,
            interaction_type,
            metadata,
            relations,
        } = input;
        Self {
            id,
            created_at,
            prompt,
            response,
            model,
            interaction_type,
            metadata: normalize_metadata(metadata),
            project_id: relations.project_id,
            task_id: relations.task_id,
            document_id: relations.document_id,
        }
    }

    /// True when the record only exists in the local store.
    pub fn is_local_only(&self) -> bool {
        self.metadata
            .get(META_STORED_LOCALLY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Local id this record was synced from, if any.
    pub fn original_local_id(&self) -> Option<&str> {
        self.metadata
            .get(META_ORIGINAL_LOCAL_ID)
            .and_then(Value::as_str)
    }

    /// Relationship fields of the record.
    pub fn relations(&self) -> Relations {
        Relations {
            project_id: self.project_id.clone(),
            task_id: self.task_id.clone(),
            document_id: self.document_id.clone(),
        }
    }

    /// Insert or replace a metadata entry.
    pub fn set_metadata(&mut self, key: &str, value: Value) {
        set_metadata_entry(&mut self.metadata, key, value);
    }
}

/// Insert or replace a metadata entry, coercing non-object bags into objects.
pub fn set_metadata_entry(metadata: &mut Value, key: &str, value: Value) {
    if !metadata.is_object() {
        *metadata = empty_json_object();
    }
    if let Some(map) = metadata.as_object_mut() {
        map.insert(key.to_string(), value);
    }
}

/// Coerce metadata into a JSON object.
pub fn normalize_metadata(metadata: Value) -> Value {
    match metadata {
        Value::Object(_) => metadata,
        Value::Null => empty_json_object(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            Value::Object(map)
        }
    }
}

/// Default metadata value for empty JSON objects.
pub fn empty_json_object() -> Value {
    Value::Object(Map::new())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_object<'de, D>(deserializer: D) -> Result<Value, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(normalize_metadata(Value::deserialize(deserializer)?))
}

//! Filtering, sorting and pagination options for listing interactions.

use crate::{InteractionRecord, InteractionType, ParseError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Equality filter over the indexed interaction columns (AND semantics).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionFilter {
    #[serde(default)]
    pub interaction_type: Option<InteractionType>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub document_id: Option<String>,
}

impl InteractionFilter {
    /// True when no criteria are set.
    pub fn is_empty(&self) -> bool {
        self.interaction_type.is_none()
            && self.project_id.is_none()
            && self.task_id.is_none()
            && self.document_id.is_none()
    }

    /// True when the record satisfies every set criterion.
    pub fn matches(&self, record: &InteractionRecord) -> bool {
        if let Some(kind) = self.interaction_type
            && record.interaction_type != kind
        {
            return false;
        }
        field_matches(self.project_id.as_deref(), record.project_id.as_deref())
            && field_matches(self.task_id.as_deref(), record.task_id.as_deref())
            && field_matches(self.document_id.as_deref(), record.document_id.as_deref())
    }
}

fn field_matches(expected: Option<&str>, actual: Option<&str>) -> bool {
    match expected {
        Some(expected) => actual == Some(expected),
        None => true,
    }
}

/// Column a listing is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    CreatedAt,
    Model,
    InteractionType,
    Prompt,
}

impl SortKey {
    /// Column name on the remote table.
    pub fn column(&self) -> &'static str {
        match self {
            SortKey::CreatedAt => "created_at",
            SortKey::Model => "model",
            SortKey::InteractionType => "interaction_type",
            SortKey::Prompt => "prompt",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for SortKey {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "created_at" => Ok(SortKey::CreatedAt),
            "model" => Ok(SortKey::Model),
            "interaction_type" => Ok(SortKey::InteractionType),
            "prompt" => Ok(SortKey::Prompt),
            other => Err(ParseError::SortKey(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(ParseError::SortDirection(value.to_string())),
        }
    }
}

/// Options for a listing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    #[serde(default)]
    pub filter: InteractionFilter,
    #[serde(default)]
    pub sort_by: SortKey,
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default)]
    pub offset: usize,
    /// Page size; zero yields an empty page.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            filter: InteractionFilter::default(),
            sort_by: SortKey::default(),
            direction: SortDirection::default(),
            offset: 0,
            limit: default_limit(),
        }
    }
}

impl ListOptions {
    pub fn with_filter(mut self, filter: InteractionFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    pub fn with_sort(mut self, sort_by: SortKey, direction: SortDirection) -> Self {
        self.sort_by = sort_by;
        self.direction = direction;
        self
    }

    /// Compare two records under this ordering, tie-breaking on id.
    pub fn compare(&self, left: &InteractionRecord, right: &InteractionRecord) -> Ordering {
        let ordering = compare_by_key(self.sort_by, left, right)
            .then_with(|| left.id.cmp(&right.id));
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

fn default_limit() -> usize {
    50
}

fn compare_by_key(key: SortKey, left: &InteractionRecord, right: &InteractionRecord) -> Ordering {
    match key {
        SortKey::CreatedAt => left.created_at.cmp(&right.created_at),
        SortKey::Model => left.model.cmp(&right.model),
        SortKey::InteractionType => left
            .interaction_type
            .as_str()
            .cmp(right.interaction_type.as_str()),
        SortKey::Prompt => left.prompt.cmp(&right.prompt),
    }
}

/// Sort records in place with a total, deterministic order.
pub fn sort_records(records: &mut [InteractionRecord], options: &ListOptions) {
    records.sort_by(|left, right| options.compare(left, right));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NewInteraction, RecordId, Relations};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn record(id: &str, second: u32, model: &str) -> InteractionRecord {
        let input = NewInteraction::new("p", "r", model, InteractionType::TextAnalysis);
        let created = Utc
            .with_ymd_and_hms(2025, 1, 1, 0, 0, second)
            .single()
            .expect("timestamp");
        InteractionRecord::from_new(RecordId::new(id), created, input)
    }

    fn ids(records: &[InteractionRecord]) -> Vec<&str> {
        records.iter().map(|record| record.id.as_str()).collect()
    }

    #[test]
    fn default_order_is_newest_first() {
        let mut records = vec![record("a", 1, "m"), record("b", 3, "m"), record("c", 2, "m")];
        sort_records(&mut records, &ListOptions::default());
        assert_eq!(ids(&records), vec!["b", "c", "a"]);
    }

    #[test]
    fn equal_keys_break_ties_on_id() {
        let mut records = vec![record("b", 1, "m"), record("c", 1, "m"), record("a", 1, "m")];
        let options = ListOptions::default().with_sort(SortKey::CreatedAt, SortDirection::Asc);
        sort_records(&mut records, &options);
        assert_eq!(ids(&records), vec!["a", "b", "c"]);

        let options = ListOptions::default();
        sort_records(&mut records, &options);
        assert_eq!(ids(&records), vec!["c", "b", "a"]);
    }

    #[test]
    fn filter_applies_all_criteria() {
        let mut tagged = record("a", 1, "m");
        tagged.project_id = Some("P1".to_string());
        tagged.task_id = Some("T1".to_string());
        let untagged = record("b", 1, "m");

        let filter = InteractionFilter {
            project_id: Some("P1".to_string()),
            ..InteractionFilter::default()
        };
        assert!(filter.matches(&tagged));
        assert!(!filter.matches(&untagged));

        let filter = InteractionFilter {
            project_id: Some("P1".to_string()),
            task_id: Some("T2".to_string()),
            ..InteractionFilter::default()
        };
        assert!(!filter.matches(&tagged));

        let filter = InteractionFilter {
            interaction_type: Some(InteractionType::PaperSearch),
            ..InteractionFilter::default()
        };
        assert!(!filter.matches(&tagged));
        assert!(InteractionFilter::default().matches(&untagged));
        assert_eq!(
            tagged.relations(),
            Relations {
                project_id: Some("P1".to_string()),
                task_id: Some("T1".to_string()),
                document_id: None,
            }
        );
    }

    #[test]
    fn sort_key_and_direction_parse() {
        assert_eq!("model".parse::<SortKey>(), Ok(SortKey::Model));
        assert_eq!("ASC".parse::<SortDirection>(), Ok(SortDirection::Asc));
        assert!("newest".parse::<SortKey>().is_err());
    }
}

use chrono::{DateTime, TimeZone, Utc};
use scriba_rs_protocol::{
    InteractionRecord, InteractionType, META_STORED_LOCALLY, NewInteraction, RecordId,
};
use serde_json::{Value, json};

/// Fixed timestamp `seconds` after 2024-05-01T00:00:00Z.
pub fn timestamp(seconds: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0)
        .single()
        .map(|base| base + chrono::Duration::seconds(seconds))
        .unwrap_or_default()
}

pub fn sample_input(prompt: &str, interaction_type: InteractionType) -> NewInteraction {
    NewInteraction::new(prompt, format!("response to {prompt}"), "gemini-pro", interaction_type)
}

/// Remote-confirmed record with `stored_locally: false`.
pub fn remote_record(id: &str, seconds: i64, interaction_type: InteractionType) -> InteractionRecord {
    record_with(RecordId::new(id), seconds, interaction_type, json!({ META_STORED_LOCALLY: false }))
}

/// Local-only record in the local id space.
pub fn local_record(seconds: i64, interaction_type: InteractionType) -> InteractionRecord {
    record_with(
        RecordId::new_local(),
        seconds,
        interaction_type,
        json!({ META_STORED_LOCALLY: true }),
    )
}

fn record_with(
    id: RecordId,
    seconds: i64,
    interaction_type: InteractionType,
    metadata: Value,
) -> InteractionRecord {
    let input = sample_input(&format!("prompt {id}"), interaction_type).with_metadata(metadata);
    InteractionRecord::from_new(id, timestamp(seconds), input)
}

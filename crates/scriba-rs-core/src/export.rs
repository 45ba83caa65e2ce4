//! Rendering interaction records as downloadable documents.

use crate::error::InteractionError;
use chrono::NaiveDate;
use scriba_rs_protocol::{ExportDocument, ExportFormat, InteractionRecord};

const CSV_HEADER: [&str; 6] = [
    "id",
    "created_at",
    "prompt",
    "response",
    "model",
    "interaction_type",
];

/// Render `records` in `format`, naming the file after `date`.
pub fn render_export(
    records: &[InteractionRecord],
    format: ExportFormat,
    date: NaiveDate,
) -> Result<ExportDocument, InteractionError> {
    let content = match format {
        ExportFormat::Json => serde_json::to_string_pretty(records)
            .map_err(|err| InteractionError::Export(err.to_string()))?,
        ExportFormat::Csv => render_csv(records),
    };
    Ok(ExportDocument {
        content,
        filename: export_filename(format, date),
        mime_type: format.mime_type().to_string(),
        record_count: records.len(),
    })
}

/// `ai-interactions-YYYY-MM-DD.{ext}`
pub fn export_filename(format: ExportFormat, date: NaiveDate) -> String {
    format!(
        "ai-interactions-{}.{}",
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

fn render_csv(records: &[InteractionRecord]) -> String {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(CSV_HEADER.join(","));
    for record in records {
        let created_at = record.created_at.to_rfc3339();
        let fields = [
            record.id.as_str(),
            created_at.as_str(),
            record.prompt.as_str(),
            record.response.as_str(),
            record.model.as_str(),
            record.interaction_type.as_str(),
        ];
        let row: Vec<String> = fields.iter().map(|field| quote(field)).collect();
        lines.push(row.join(","));
    }
    lines.join("\n")
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

//! Structured JSON extraction from free-form model output.

use crate::error::InteractionError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Parse JSON out of model output.
///
/// The whole text is tried first. Otherwise the first balanced `{...}` or
/// `[...]` span that parses is returned. Brackets inside string literals are
/// ignored while scanning.
pub fn parse_model_json(text: &str) -> Result<Value, InteractionError> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }
    let bytes = trimmed.as_bytes();
    for (start, byte) in bytes.iter().enumerate() {
        if *byte != b'{' && *byte != b'[' {
            continue;
        }
        let Some(end) = balanced_end(bytes, start) else {
            continue;
        };
        if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
            return Ok(value);
        }
    }
    Err(InteractionError::MalformedModelOutput(preview(trimmed)))
}

/// Parse JSON out of model output into `T`.
pub fn parse_model_json_as<T: DeserializeOwned>(text: &str) -> Result<T, InteractionError> {
    let value = parse_model_json(text)?;
    serde_json::from_value(value)
        .map_err(|err| InteractionError::MalformedModelOutput(err.to_string()))
}

/// Index of the bracket closing the one at `start`, if the span is balanced.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut closers = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for (offset, byte) in bytes[start..].iter().enumerate() {
        if in_string {
            match (escaped, byte) {
                (true, _) => escaped = false,
                (false, b'\\') => escaped = true,
                (false, b'"') => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => closers.push(b'}'),
            b'[' => closers.push(b']'),
            b'}' | b']' => {
                if closers.pop() != Some(*byte) {
                    return None;
                }
                if closers.is_empty() {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 80;
    match text.char_indices().nth(LIMIT) {
        Some((index, _)) => format!("no JSON found in \"{}...\"", &text[..index]),
        None => format!("no JSON found in \"{text}\""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn parses_plain_json() {
        let value = parse_model_json(r#" {"title": "A"} "#).expect("parse");
        assert_eq!(value, json!({ "title": "A" }));
    }

    #[test]
    fn extracts_array_from_prose() {
        let text = "Here are the papers:\n```json\n[{\"title\": \"A [draft]\"}, {\"title\": \"B\"}]\n```\nEnjoy!";
        let value = parse_model_json(text).expect("parse");
        assert_eq!(value, json!([{ "title": "A [draft]" }, { "title": "B" }]));
    }

    #[test]
    fn skips_unparseable_spans() {
        let text = "note {not json} then {\"ok\": true}";
        assert_eq!(parse_model_json(text).expect("parse"), json!({ "ok": true }));
    }

    #[test]
    fn handles_escaped_quotes_in_strings() {
        let text = r#"result: {"quote": "she said \"}\" loudly"} done"#;
        let value = parse_model_json(text).expect("parse");
        assert_eq!(value, json!({ "quote": "she said \"}\" loudly" }));
    }

    #[test]
    fn rejects_text_without_json() {
        let err = parse_model_json("I could not find any papers.").expect_err("no json");
        assert!(matches!(err, InteractionError::MalformedModelOutput(_)));
        let err = parse_model_json("broken {\"a\": [1, 2}").expect_err("unbalanced");
        assert!(matches!(err, InteractionError::MalformedModelOutput(_)));
    }

    #[test]
    fn parses_into_typed_value() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Paper {
            title: String,
            year: u32,
        }
        let papers: Vec<Paper> =
            parse_model_json_as("Results: [{\"title\": \"X\", \"year\": 2021}]").expect("typed");
        assert_eq!(
            papers,
            vec![Paper {
                title: "X".to_string(),
                year: 2021
            }]
        );
        let err = parse_model_json_as::<Vec<Paper>>("{\"title\": \"X\"}").expect_err("shape");
        assert!(matches!(err, InteractionError::MalformedModelOutput(_)));
    }
}

//! Environment variable overrides for remote credentials.

use serde_json::{Map, Value};

/// Environment variable overriding `remote.url`.
pub const ENV_REMOTE_URL: &str = "SCRIBA_REMOTE_URL";
/// Environment variable overriding `remote.key`.
pub const ENV_REMOTE_KEY: &str = "SCRIBA_REMOTE_KEY";

/// Build an overlay layer from environment lookups; `None` when nothing is set.
///
/// Empty values are ignored so an exported-but-blank variable does not wipe a
/// file-configured credential.
pub(super) fn env_overlay<F>(lookup: F) -> Option<Value>
where
    F: Fn(&str) -> Option<String>,
{
    let mut remote = Map::new();
    for (name, field) in [(ENV_REMOTE_URL, "url"), (ENV_REMOTE_KEY, "key")] {
        if let Some(value) = lookup(name).filter(|value| !value.trim().is_empty()) {
            remote.insert(field.to_string(), Value::String(value));
        }
    }
    if remote.is_empty() {
        return None;
    }
    let mut root = Map::new();
    root.insert("remote".to_string(), Value::Object(remote));
    Some(Value::Object(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn overlay_includes_only_set_variables() {
        let overlay = env_overlay(|name| match name {
            ENV_REMOTE_URL => Some("https://abc.supabase.co".to_string()),
            _ => None,
        });
        assert_eq!(
            overlay,
            Some(json!({ "remote": { "url": "https://abc.supabase.co" } }))
        );
    }

    #[test]
    fn blank_variables_are_ignored() {
        let overlay = env_overlay(|_| Some("  ".to_string()));
        assert_eq!(overlay, None);
    }
}

//! Schema validation helpers for Scriba JSON5 configuration.

use super::SchemaMode;
use crate::ConfigError;
use serde_json::{Map, Value};

/// Validate a single config layer against the schema.
pub(super) fn validate_layer_schema(
    value: &Value,
    _mode: SchemaMode,
    layer: &str,
) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    ensure_allowed_keys(map, &["$schema", "remote", "local", "sync", "list"], layer, "")?;

    if let Some(value) = map.get("$schema") {
        expect_string(value, layer, "$schema")?;
    }
    if let Some(value) = map.get("remote") {
        validate_remote(value, layer, "remote")?;
    }
    if let Some(value) = map.get("local") {
        validate_local(value, layer, "local")?;
    }
    if let Some(value) = map.get("sync") {
        validate_sync(value, layer, "sync")?;
    }
    if let Some(value) = map.get("list") {
        validate_list(value, layer, "list")?;
    }
    Ok(())
}

/// Validate the "remote" block.
fn validate_remote(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    let allowed = [
        "url",
        "key",
        "timeout_secs",
        "use_stored_procedures",
        "auto_create_schema",
        "credentials_path",
    ];
    ensure_allowed_keys(map, &allowed, layer, path)?;

    for key in ["url", "key", "credentials_path"] {
        if let Some(value) = map.get(key) {
            expect_optional_string(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("timeout_secs") {
        expect_u64(value, layer, &join_path(path, "timeout_secs"))?;
    }
    for key in ["use_stored_procedures", "auto_create_schema"] {
        if let Some(value) = map.get(key) {
            expect_bool(value, layer, &join_path(path, key))?;
        }
    }
    Ok(())
}

/// Validate the "local" block.
fn validate_local(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["path", "max_records", "max_bytes"], layer, path)?;

    if let Some(value) = map.get("path") {
        expect_optional_string(value, layer, &join_path(path, "path"))?;
    }
    for key in ["max_records", "max_bytes"] {
        if let Some(value) = map.get(key)
            && !value.is_null()
        {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    Ok(())
}

fn validate_sync(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["batch_size", "on_startup"], layer, path)?;

    if let Some(value) = map.get("batch_size") {
        expect_u64(value, layer, &join_path(path, "batch_size"))?;
    }
    if let Some(value) = map.get("on_startup") {
        expect_bool(value, layer, &join_path(path, "on_startup"))?;
    }
    Ok(())
}

/// Validate the "list" block.
fn validate_list(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    let allowed = [
        "page_size",
        "sort_by",
        "sort_direction",
        "merge_pagination",
        "remote_chunk_size",
    ];
    ensure_allowed_keys(map, &allowed, layer, path)?;

    for key in ["page_size", "remote_chunk_size"] {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("sort_by") {
        expect_one_of(
            value,
            &["created_at", "model", "interaction_type", "prompt"],
            layer,
            &join_path(path, "sort_by"),
        )?;
    }
    if let Some(value) = map.get("sort_direction") {
        expect_one_of(
            value,
            &["asc", "desc"],
            layer,
            &join_path(path, "sort_direction"),
        )?;
    }
    if let Some(value) = map.get("merge_pagination") {
        expect_one_of(
            value,
            &["exact", "approximate"],
            layer,
            &join_path(path, "merge_pagination"),
        )?;
    }
    Ok(())
}

/// Expect a JSON object or return a typed error.
fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(invalid_field(layer, path, "expected object")),
    }
}

fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_string() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string"))
    }
}

/// Strings that may be explicitly nulled by a higher layer.
fn expect_optional_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_null() {
        return Ok(());
    }
    expect_string(value, layer, path)
}

fn expect_bool(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_boolean() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected bool"))
    }
}

/// Expect a non-negative integer.
fn expect_u64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_u64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected non-negative integer"))
    }
}

/// Expect a string drawn from a fixed set of values.
fn expect_one_of(
    value: &Value,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    let Some(text) = value.as_str() else {
        return Err(invalid_field(layer, path, "expected string"));
    };
    if allowed.contains(&text) {
        Ok(())
    } else {
        Err(invalid_field(
            layer,
            path,
            &format!("expected one of {}", allowed.join(", ")),
        ))
    }
}

/// Ensure an object contains only allowed keys.
fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    match map.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(invalid_field(layer, &join_path(path, key), "unknown key")),
        None => Ok(()),
    }
}

/// Join nested paths for error messages.
fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        path: format!("{layer}:{path}"),
        message: message.to_string(),
    }
}

//! Tests for layered configuration loading.

use super::*;
use crate::MergePagination;
use pretty_assertions::assert_eq;
use scriba_rs_protocol::{SortDirection, SortKey};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Write JSON5 contents to a path, creating parent directories if needed.
fn write_json5(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("dir");
    }
    fs::write(path, contents).expect("write");
}

/// Project layout with a `.git` marker and a nested working directory.
fn project(temp: &TempDir) -> (PathBuf, PathBuf) {
    let project_root = temp.path().join("project");
    fs::create_dir_all(project_root.join(".git")).expect("git");
    let cwd = project_root.join("subdir");
    fs::create_dir_all(&cwd).expect("cwd");
    (project_root, cwd)
}

fn isolated_options(cwd: &Path) -> LayeredConfigOptions {
    let mut options = LayeredConfigOptions::new(cwd).without_env();
    options.system_config_path = None;
    options.user_config_path = None;
    options.requirements_path = None;
    options
}

/// An empty config yields the documented defaults.
#[test]
fn parse_minimal_config() {
    let config = ScribaConfig::load_from_str("{}").expect("config");
    assert_eq!(config.remote.timeout_secs, 30);
    assert!(config.remote.use_stored_procedures);
    assert!(!config.remote.auto_create_schema);
    assert_eq!(config.sync.batch_size, 10);
    assert_eq!(config.list.page_size, 50);
    assert_eq!(config.list.sort_by, SortKey::CreatedAt);
    assert_eq!(config.list.sort_direction, SortDirection::Desc);
    assert_eq!(config.list.merge_pagination, MergePagination::Exact);
    assert_eq!(config.list.remote_chunk_size, 500);
    assert_eq!(config.remote.credentials(), None);
}

/// Reject unexpected top-level config keys.
#[test]
fn rejects_unknown_top_level_key() {
    let err = ScribaConfig::load_from_str("{ unexpected: true }").unwrap_err();
    assert!(format!("{err}").contains("unknown key"));
}

#[test]
fn rejects_unknown_merge_mode() {
    let err = ScribaConfig::load_from_str(r#"{ list: { merge_pagination: "fuzzy" } }"#)
        .unwrap_err();
    assert!(format!("{err}").contains("list.merge_pagination"));
}

/// A zero batch size would stall sync forever.
#[test]
fn rejects_zero_batch_size() {
    let err = ScribaConfig::load_from_str("{ sync: { batch_size: 0 } }").unwrap_err();
    assert!(format!("{err}").contains("sync.batch_size"));
}

#[test]
fn blank_credentials_are_not_usable() {
    let config =
        ScribaConfig::load_from_str(r#"{ remote: { url: "https://x.supabase.co", key: " " } }"#)
            .expect("config");
    assert_eq!(config.remote.credentials(), None);
}

/// Credentials default to a file inside the data directory.
#[test]
fn credentials_path_follows_data_dir() {
    let config = ScribaConfig::load_from_str(r#"{ local: { path: "/var/lib/scriba" } }"#)
        .expect("config");
    assert_eq!(
        config.credentials_path(),
        PathBuf::from("/var/lib/scriba").join(crate::DEFAULT_CREDENTIALS_FILE)
    );
}

/// Ensure repo config takes precedence over cwd and project config.
#[test]
fn layered_config_prefers_repo_over_cwd() {
    let temp = TempDir::new().expect("tmp");
    let (project_root, cwd) = project(&temp);

    let system_config = temp.path().join("system.json5");
    write_json5(&system_config, "{ sync: { batch_size: 1 } }");
    let user_config = temp.path().join("user.json5");
    write_json5(&user_config, "{ sync: { batch_size: 2 } }");
    write_json5(
        &project_root.join(DEFAULT_CONFIG_FILE),
        "{ sync: { batch_size: 3 } }",
    );
    write_json5(&cwd.join(DEFAULT_CONFIG_FILE), "{ sync: { batch_size: 4 } }");
    write_json5(
        &project_root
            .join(DEFAULT_CONFIG_DIR)
            .join(DEFAULT_CONFIG_FILE),
        "{ sync: { batch_size: 5 }, list: { page_size: 7 } }",
    );

    let mut options = isolated_options(&cwd);
    options.system_config_path = Some(system_config);
    options.user_config_path = Some(user_config);

    let layered = ScribaConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.config.sync.batch_size, 5);
    assert_eq!(layered.config.list.page_size, 7);
    let sources: Vec<_> = layered.layers.iter().map(|layer| layer.source).collect();
    assert_eq!(
        sources,
        vec![
            ConfigLayerSource::System,
            ConfigLayerSource::User,
            ConfigLayerSource::Project,
            ConfigLayerSource::Cwd,
            ConfigLayerSource::Repo,
        ]
    );
}

/// Requirements pin keys that later layers try to change.
#[test]
fn requirements_lock_overrides() {
    let temp = TempDir::new().expect("tmp");
    let (_, cwd) = project(&temp);

    let requirements = temp.path().join("requirements.json5");
    write_json5(
        &requirements,
        r#"{ remote: { url: "https://locked.supabase.co" } }"#,
    );
    let runtime_config = temp.path().join("runtime.json5");
    write_json5(
        &runtime_config,
        r#"{ remote: { url: "https://other.supabase.co", key: "anon" } }"#,
    );

    let mut options = isolated_options(&cwd).with_runtime_path(&runtime_config);
    options.requirements_path = Some(requirements);

    let layered = ScribaConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(
        layered.config.remote.credentials(),
        Some(("https://locked.supabase.co", "anon"))
    );
}

#[test]
fn runtime_override_wins_without_constraints() {
    let temp = TempDir::new().expect("tmp");
    let (_, cwd) = project(&temp);

    let system_config = temp.path().join("system.json5");
    write_json5(&system_config, r#"{ list: { merge_pagination: "exact" } }"#);
    let runtime_config = temp.path().join("runtime.json5");
    write_json5(
        &runtime_config,
        r#"{ list: { merge_pagination: "approximate" } }"#,
    );

    let mut options = isolated_options(&cwd).with_runtime_path(&runtime_config);
    options.system_config_path = Some(system_config);

    let layered = ScribaConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(
        layered.config.list.merge_pagination,
        MergePagination::Approximate
    );
}

/// Invalid values in any layer are reported with the layer label.
#[test]
fn layer_errors_name_the_layer() {
    let temp = TempDir::new().expect("tmp");
    let (_, cwd) = project(&temp);
    let runtime_config = temp.path().join("runtime.json5");
    write_json5(&runtime_config, r#"{ remote: { timeout_secs: "soon" } }"#);

    let options = isolated_options(&cwd).with_runtime_path(&runtime_config);
    let err = ScribaConfig::load_layered_with_options(options).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("runtime("));
    assert!(msg.contains("remote.timeout_secs"));
}

//! Layered configuration loader with constraints and environment overrides.
//!
//! Discovers configuration layers (system/user/project/etc), validates schema,
//! merges them with optional constraints, applies environment overrides, and
//! produces a final `ScribaConfig`.

mod env;
mod layer_io;
mod merge;
mod schema;
mod utils;

#[cfg(test)]
mod tests;

pub use env::{ENV_REMOTE_KEY, ENV_REMOTE_URL};

use crate::{ConfigError, ScribaConfig};
use log::{debug, info};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Default config filename in local layers.
const DEFAULT_CONFIG_FILE: &str = "scriba.json5";
/// Default config directory under user or repo roots.
const DEFAULT_CONFIG_DIR: &str = crate::DEFAULT_HOME_DIR;
/// Marker files/dirs that identify a project root.
const DEFAULT_PROJECT_ROOT_MARKERS: &[&str] = &[".git"];

#[cfg(not(windows))]
/// Default system config path.
const SYSTEM_CONFIG_PATH: &str = "/etc/scriba/scriba.json5";
#[cfg(not(windows))]
/// Default requirements path.
const SYSTEM_REQUIREMENTS_PATH: &str = "/etc/scriba/requirements.json5";
#[cfg(windows)]
const SYSTEM_CONFIG_PATH: &str = "C:\\ProgramData\\scriba\\scriba.json5";
#[cfg(windows)]
const SYSTEM_REQUIREMENTS_PATH: &str = "C:\\ProgramData\\scriba\\requirements.json5";

/// Effective config plus metadata about which layers were loaded.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// The merged, validated config.
    pub config: ScribaConfig,
    /// Metadata for each layer that contributed.
    pub layers: Vec<ConfigLayer>,
}

/// Origin for a single config layer in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// Immutable requirements constraints.
    Requirements,
    /// System-wide configuration.
    System,
    /// User-specific configuration.
    User,
    /// Project root configuration.
    Project,
    /// Current working directory configuration.
    Cwd,
    /// Repo-local configuration.
    Repo,
    /// Runtime overrides.
    Runtime,
    /// Process environment (highest precedence).
    Environment,
}

/// Metadata about a config layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayer {
    pub source: ConfigLayerSource,
    /// Location on disk, if the layer came from a file.
    pub path: Option<PathBuf>,
}

/// Schema validation mode for layered configs.
#[derive(Debug, Clone, Copy)]
enum SchemaMode {
    /// Partial validation for non-final layers.
    Partial,
    /// Full validation for the effective config.
    Full,
}

/// Options controlling layered config discovery and overrides.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    /// Working directory used to resolve local layers.
    pub cwd: PathBuf,
    /// Optional system config path (defaults to `/etc/scriba/scriba.json5` on Unix).
    pub system_config_path: Option<PathBuf>,
    /// Optional user config path (defaults to `~/.scriba/scriba.json5`).
    pub user_config_path: Option<PathBuf>,
    /// Optional requirements/constraints path for locked settings.
    pub requirements_path: Option<PathBuf>,
    /// Runtime override config paths applied after file layers.
    pub runtime_paths: Vec<PathBuf>,
    /// Marker files/dirs used to detect the project root.
    pub project_root_markers: Vec<String>,
    /// Apply `SCRIBA_REMOTE_URL` / `SCRIBA_REMOTE_KEY` from the environment.
    pub apply_env: bool,
}

impl LayeredConfigOptions {
    /// Create options with default layer locations for the provided cwd.
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            system_config_path: layer_io::default_system_config_path(),
            user_config_path: layer_io::default_user_config_path(),
            requirements_path: layer_io::default_requirements_path(),
            runtime_paths: Vec::new(),
            project_root_markers: DEFAULT_PROJECT_ROOT_MARKERS
                .iter()
                .map(|marker| marker.to_string())
                .collect(),
            apply_env: true,
        }
    }

    /// Add a runtime override config path.
    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Only read file layers; ignore the process environment.
    pub fn without_env(mut self) -> Self {
        self.apply_env = false;
        self
    }
}

impl ScribaConfig {
    /// Load a single config from a path (no layering).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        info!("loading config from path: {}", path.as_ref().display());
        let contents = fs::read_to_string(path)?;
        let value: Value = json5::from_str(&contents)?;
        config_from_value(value, "config")
    }

    /// Load a single config from JSON5 contents (no layering).
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let value: Value = json5::from_str(contents)?;
        config_from_value(value, "config")
    }

    /// Load a layered config stack using the default layer locations.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        info!(
            "loading layered config with defaults (cwd={})",
            cwd.as_ref().display()
        );
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    /// Load a layered config stack using explicit layer locations and overrides.
    ///
    /// Layer precedence (low -> high): requirements (constraints), system, user,
    /// project, cwd, repo, runtime overrides, environment.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let cwd = utils::normalize_path(&options.cwd)?;
        debug!("normalized cwd for config load: {}", cwd.display());
        let mut layers = Vec::new();
        let mut merge_layers = Vec::new();
        let mut seen_paths = HashSet::new();

        let requirements = layer_io::load_optional_layer(
            ConfigLayerSource::Requirements,
            options.requirements_path.as_deref(),
        )?;
        let requirements_value = requirements.as_ref().map(|layer| layer.value.clone());
        if let Some(layer) = requirements {
            debug!("loaded requirements layer");
            layers.push(layer.meta);
        }

        for (source, path) in [
            (
                ConfigLayerSource::System,
                options.system_config_path.as_deref(),
            ),
            (ConfigLayerSource::User, options.user_config_path.as_deref()),
        ] {
            if let Some(layer) = layer_io::load_optional_layer(source, path)? {
                debug!("loaded {:?} layer", source);
                layers.push(layer.meta.clone());
                merge_layers.push(layer);
            }
        }

        let project_root = utils::find_project_root(&cwd, &options.project_root_markers);
        let mut local_candidates = Vec::new();
        if let Some(project_root) = project_root.as_ref() {
            debug!("resolved project root: {}", project_root.display());
            local_candidates.push((
                ConfigLayerSource::Project,
                project_root.join(DEFAULT_CONFIG_FILE),
            ));
        } else {
            debug!("project root not found; skipping project/repo layers");
        }
        local_candidates.push((ConfigLayerSource::Cwd, cwd.join(DEFAULT_CONFIG_FILE)));
        if let Some(project_root) = project_root.as_ref() {
            local_candidates.push((
                ConfigLayerSource::Repo,
                project_root
                    .join(DEFAULT_CONFIG_DIR)
                    .join(DEFAULT_CONFIG_FILE),
            ));
        }

        for (source, path) in local_candidates {
            if !path.exists() {
                debug!(
                    "skipping missing layer (source={:?}, path={})",
                    source,
                    path.display()
                );
                continue;
            }
            if !seen_paths.insert(utils::unique_path(&path)) {
                debug!(
                    "skipping duplicate layer (source={:?}, path={})",
                    source,
                    path.display()
                );
                continue;
            }
            let loaded = layer_io::load_required_layer(source, &path)?;
            layers.push(loaded.meta.clone());
            merge_layers.push(loaded);
        }

        for runtime_path in &options.runtime_paths {
            let loaded = layer_io::load_required_layer(ConfigLayerSource::Runtime, runtime_path)?;
            debug!("loaded runtime layer (path={})", runtime_path.display());
            layers.push(loaded.meta.clone());
            merge_layers.push(loaded);
        }

        if options.apply_env
            && let Some(overlay) = env::env_overlay(|name| std::env::var(name).ok())
        {
            debug!("applying environment overrides");
            layers.push(ConfigLayer {
                source: ConfigLayerSource::Environment,
                path: None,
            });
            merge_layers.push(LoadedLayer {
                meta: ConfigLayer {
                    source: ConfigLayerSource::Environment,
                    path: None,
                },
                value: overlay,
            });
        }

        let mut merged = Value::Object(serde_json::Map::new());
        if let Some(requirements_value) = &requirements_value {
            merge::merge_json_values(&mut merged, requirements_value);
        }
        for layer in merge_layers {
            merge::merge_json_with_constraints(
                &mut merged,
                &layer.value,
                requirements_value.as_ref(),
            );
        }

        let config = config_from_value(merged, "effective")?;
        info!("layered config loaded (layers={})", layers.len());
        Ok(LayeredConfig { config, layers })
    }

    /// Validate configuration invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.batch_size == 0 {
            return Err(ConfigError::InvalidField {
                path: "sync.batch_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.list.page_size == 0 {
            return Err(ConfigError::InvalidField {
                path: "list.page_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.list.remote_chunk_size == 0 {
            return Err(ConfigError::InvalidField {
                path: "list.remote_chunk_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.remote.timeout_secs == 0 {
            return Err(ConfigError::InvalidField {
                path: "remote.timeout_secs".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Internal representation of a loaded config layer.
#[derive(Debug, Clone)]
struct LoadedLayer {
    meta: ConfigLayer,
    value: Value,
}

fn config_from_value(value: Value, label: &str) -> Result<ScribaConfig, ConfigError> {
    schema::validate_layer_schema(&value, SchemaMode::Full, label)?;
    let config: ScribaConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}

pub mod effective;
pub mod error;
pub mod merge;

pub use effective::{EffectiveConfig, MachineConf, VolumeConf, default_sizing, resolve};
pub use error::*;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Environment variable pointing directly at a config file
pub const CONFIG_PATH_ENV: &str = "NODEFLOW_CONFIG_PATH";

/// Locate the global config file
///
/// Searched in order:
/// 1. `NODEFLOW_CONFIG_PATH`
/// 2. current directory: nodeflow.yaml, .nodeflow.yaml
/// 3. ~/.config/nodeflow/config.yaml
///
/// Returns `None` when no file exists anywhere; callers fall back to an
/// empty configuration.
pub fn find_config_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        tracing::warn!(
            "{} points at {}, which does not exist",
            CONFIG_PATH_ENV,
            path.display()
        );
    }

    let current_dir = std::env::current_dir()?;
    for filename in ["nodeflow.yaml", ".nodeflow.yaml"] {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("nodeflow").join("config.yaml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

/// Global configuration shared by every provisioning session
///
/// Holds the top-level settings (`nsupdate_url`) and one section per
/// provider family, e.g. `openstack:`.
#[derive(Debug, Clone, Default)]
pub struct GlobalConfig {
    root: Map<String, Value>,
    source: Option<PathBuf>,
}

impl GlobalConfig {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let root = match serde_yaml::from_str::<Value>(content)? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => return Err(ConfigError::NotAMapping(type_name(&other).to_string())),
        };
        Ok(Self { root, source: None })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml_str(&content)?;
        config.source = Some(path.to_path_buf());
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load the file found by [`find_config_file`], or an empty config
    pub fn discover() -> Result<Self> {
        match find_config_file()? {
            Some(path) => Self::load(path),
            None => {
                tracing::debug!("No config file found, using built-in defaults");
                Ok(Self::empty())
            }
        }
    }

    /// File this config was loaded from
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// DNS update endpoint
    pub fn nsupdate_url(&self) -> Option<&str> {
        self.root.get("nsupdate_url").and_then(Value::as_str)
    }

    /// Raw section for a provider family (case-insensitive family name)
    pub fn family(&self, family: &str) -> Option<&Value> {
        self.root.get(&family.to_lowercase()).filter(|v| !v.is_null())
    }

    /// Deserialize a provider family section; a missing section yields
    /// the type's defaults.
    pub fn section<T: DeserializeOwned>(&self, family: &str) -> Result<T> {
        let value = self
            .family(family)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        serde_json::from_value(value).map_err(|source| ConfigError::InvalidSection {
            section: family.to_lowercase(),
            source,
        })
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

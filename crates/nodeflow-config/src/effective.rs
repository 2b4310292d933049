//! Effective sizing configuration
//!
//! Resolved from four tiers, highest precedence first:
//!
//! 1. the per-call configuration
//! 2. the provider family's section of the per-call configuration
//! 3. the provider family's section of the global configuration
//! 4. built-in defaults
//!
//! Every numeric field ends up at the largest value any tier asks for.

use crate::GlobalConfig;
use crate::error::{ConfigError, Result};
use crate::merge::{combine, flatten};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Machine requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConf {
    /// Root disk in GB
    pub disk: u64,

    /// RAM in MB
    pub ram: u64,

    pub cpus: u32,
}

/// Extra block volumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeConf {
    pub count: u32,

    /// Size of each volume in GB
    pub size: u64,
}

/// Merged configuration for one provisioning operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub machine: MachineConf,
    pub volumes: VolumeConf,

    /// Keys that are not part of the sizing model, kept as merged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            machine: MachineConf {
                disk: 20,
                ram: 8000,
                cpus: 1,
            },
            volumes: VolumeConf { count: 0, size: 0 },
            extra: Map::new(),
        }
    }
}

/// Built-in defaults tier
pub fn default_sizing() -> Value {
    json!({
        "machine": {
            "disk": 20,
            "ram": 8000,
            "cpus": 1
        },
        "volumes": {
            "count": 0,
            "size": 0
        }
    })
}

/// Merge the four configuration tiers into an [`EffectiveConfig`]
///
/// `explicit` may be a mapping or a sequence of mappings. Its own
/// `family` key is consumed as tier 2 rather than copied into the result.
pub fn resolve(
    explicit: Option<&Value>,
    family: &str,
    global: &GlobalConfig,
    defaults: &Value,
) -> Result<EffectiveConfig> {
    let family = family.to_lowercase();
    let explicit_tier = explicit.map(flatten).unwrap_or_default();

    let family_tier: Vec<Map<String, Value>> = explicit_tier
        .iter()
        .filter_map(|conf| conf.get(&family))
        .flat_map(flatten)
        .collect();

    let explicit_tier = explicit_tier.into_iter().map(|mut conf| {
        conf.remove(&family);
        conf
    });

    let global_tier = global.family(&family).map(flatten).unwrap_or_default();

    let merged = combine(
        explicit_tier
            .chain(family_tier)
            .chain(global_tier)
            .chain(flatten(defaults)),
    );

    tracing::debug!("Effective {} config: {}", family, serde_json::Value::Object(merged.clone()));

    serde_json::from_value(Value::Object(merged)).map_err(|source| ConfigError::InvalidSection {
        section: family,
        source,
    })
}

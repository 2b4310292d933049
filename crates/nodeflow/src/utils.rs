use anyhow::Context;
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};

/// Public key files tried when no key is given
const DEFAULT_KEYS: [&str; 2] = ["id_rsa.pub", "id_ed25519.pub"];

/// Read the operator's SSH public key
///
/// Uses `path` when given, otherwise the first default key found in
/// `~/.ssh`. Returns `None` when there is none.
pub fn read_ssh_pubkey(path: Option<&Path>) -> anyhow::Result<Option<String>> {
    if let Some(path) = path {
        let key = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read SSH key {}", path.display()))?;
        return Ok(Some(key.trim().to_string()));
    }

    let Some(home) = dirs::home_dir() else {
        return Ok(None);
    };
    for name in DEFAULT_KEYS {
        let candidate: PathBuf = home.join(".ssh").join(name);
        if candidate.exists() {
            let key = std::fs::read_to_string(&candidate)
                .with_context(|| format!("Failed to read SSH key {}", candidate.display()))?;
            tracing::debug!("Using SSH key {}", candidate.display());
            return Ok(Some(key.trim().to_string()));
        }
    }

    tracing::warn!("No SSH public key found; the node will not accept key logins");
    Ok(None)
}

/// Sizing overrides given on the command line
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides {
    pub ram: Option<u64>,
    pub disk: Option<u64>,
    pub cpus: Option<u32>,
    pub volumes: Option<u32>,
    pub volume_size: Option<u64>,
}

impl Overrides {
    fn to_value(self) -> Value {
        let mut machine = Map::new();
        if let Some(ram) = self.ram {
            machine.insert("ram".into(), json!(ram));
        }
        if let Some(disk) = self.disk {
            machine.insert("disk".into(), json!(disk));
        }
        if let Some(cpus) = self.cpus {
            machine.insert("cpus".into(), json!(cpus));
        }

        let mut volumes = Map::new();
        if let Some(count) = self.volumes {
            volumes.insert("count".into(), json!(count));
        }
        if let Some(size) = self.volume_size {
            volumes.insert("size".into(), json!(size));
        }

        let mut root = Map::new();
        if !machine.is_empty() {
            root.insert("machine".into(), Value::Object(machine));
        }
        if !volumes.is_empty() {
            root.insert("volumes".into(), Value::Object(volumes));
        }
        Value::Object(root)
    }
}

/// Per-call configuration: flag overrides first, then the `--conf` file
pub fn explicit_config(conf: Option<&Path>, overrides: Overrides) -> anyhow::Result<Value> {
    let mut tiers = vec![overrides.to_value()];
    if let Some(path) = conf {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let value: Value = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        if !value.is_null() {
            tiers.push(value);
        }
    }
    Ok(Value::Array(tiers))
}

//! openstack CLI wrapper
//!
//! Every call runs `openstack <args> -f json` and parses the JSON the
//! client prints. Authentication comes from the usual `OS_*` variables or
//! from `clouds.yaml` via `--os-cloud`.

use crate::error::{OpenStackError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::IpAddr;
use std::process::Stdio;
use tokio::process::Command;

/// Runs one openstack CLI invocation and returns its stdout
#[async_trait]
pub trait CliRunner: Send + Sync {
    async fn run(&self, args: &[String]) -> Result<String>;
}

/// The real `openstack` executable
#[derive(Debug, Clone, Default)]
pub struct OpenStackCli {
    cloud: Option<String>,
}

impl OpenStackCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a named entry from clouds.yaml
    pub fn with_cloud(cloud: impl Into<String>) -> Self {
        Self {
            cloud: Some(cloud.into()),
        }
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new("openstack");
        if let Some(cloud) = &self.cloud {
            cmd.arg("--os-cloud").arg(cloud);
        }
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl CliRunner for OpenStackCli {
    async fn run(&self, args: &[String]) -> Result<String> {
        tracing::debug!("Running: openstack {}", args.join(" "));

        let output = match self.command(args).output().await {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OpenStackError::CliNotFound);
            }
            Err(e) => return Err(e.into()),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(args, stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Map a failed invocation to an error kind by its stderr
pub fn classify_failure(args: &[String], stderr: &str) -> OpenStackError {
    let lower = stderr.to_lowercase();
    let command = args
        .iter()
        .take_while(|a| !a.starts_with('-'))
        .take(2)
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");

    if lower.contains("http 429")
        || lower.contains("(http 413)")
        || lower.contains("rate limit")
        || lower.contains("too many requests")
    {
        OpenStackError::RateLimited(stderr.to_string())
    } else if lower.contains("unknown command")
        || lower.contains("is not an openstack command")
        || lower.contains("public endpoint for")
    {
        OpenStackError::Unsupported(format!("{}: {}", command, stderr))
    } else if lower.contains("could not be found")
        || (lower.starts_with("no ") && (lower.contains(" found") || lower.contains(" exists")))
    {
        OpenStackError::NotFound(stderr.to_string())
    } else {
        OpenStackError::CommandFailed(format!("{}: {}", command, stderr))
    }
}

/// Build an argument list from string slices
pub(crate) fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

/// Parse a JSON listing; empty output counts as an empty list
pub(crate) fn parse_list<T: serde::de::DeserializeOwned>(output: &str) -> Result<Vec<T>> {
    if output.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(output)?)
}

/// `image list` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInfo {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,
}

/// `flavor list` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlavorInfo {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "RAM")]
    pub ram: u64,

    #[serde(rename = "Disk")]
    pub disk: u64,

    #[serde(rename = "VCPUs")]
    pub vcpus: u32,
}

/// `network list` and `security group list` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedInfo {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,
}

/// `server list` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSummary {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Status")]
    pub status: String,

    #[serde(rename = "Networks", default)]
    pub networks: Value,
}

/// `server show` / `server create` output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerDetail {
    pub id: String,
    pub name: String,
    pub status: String,

    #[serde(default)]
    pub addresses: Value,

    #[serde(default)]
    pub flavor: Value,

    #[serde(default)]
    pub image: Value,
}

/// `volume list` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeSummary {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Name", default)]
    pub name: Option<String>,

    #[serde(rename = "Status")]
    pub status: String,

    #[serde(rename = "Size")]
    pub size: u64,

    #[serde(rename = "Attached to", default)]
    pub attached_to: Value,
}

impl VolumeSummary {
    /// Server ID of the first attachment
    ///
    /// Newer clients print a list of attachment objects, older ones a
    /// sentence like `Attached to <server> on /dev/vdb`.
    pub fn server_id(&self) -> Option<String> {
        match &self.attached_to {
            Value::Array(items) => items.iter().find_map(|a| {
                a.get("server_id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            }),
            Value::String(s) => s
                .strip_prefix("Attached to ")
                .and_then(|rest| rest.split_whitespace().next())
                .map(str::to_string),
            _ => None,
        }
    }
}

/// `volume show` / `volume create` output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeDetail {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    pub status: String,
    pub size: u64,
}

/// Addresses out of a server's `addresses` (or `Networks`) field
///
/// Handles both the mapping form `{"net": ["10.0.0.5", ...]}` and the
/// string form `net=10.0.0.5, 203.0.113.9; other=...`.
pub fn parse_addresses(value: &Value) -> Vec<IpAddr> {
    let mut found = Vec::new();
    match value {
        Value::Object(networks) => {
            for ips in networks.values() {
                match ips {
                    Value::Array(list) => {
                        found.extend(list.iter().filter_map(address_entry));
                    }
                    Value::String(s) => found.extend(parse_address_list(s)),
                    _ => {}
                }
            }
        }
        Value::String(s) => {
            for network in s.split(';') {
                let ips = network.split_once('=').map_or(network, |(_, ips)| ips);
                found.extend(parse_address_list(ips));
            }
        }
        _ => {}
    }
    found
}

fn address_entry(value: &Value) -> Option<IpAddr> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        // Nova API form: {"addr": "10.0.0.5", "version": 4}
        Value::Object(entry) => entry.get("addr")?.as_str()?.parse().ok(),
        _ => None,
    }
}

fn parse_address_list(s: &str) -> impl Iterator<Item = IpAddr> + '_ {
    s.split(',').filter_map(|ip| ip.trim().parse().ok())
}

/// Split addresses into (public, private)
pub fn partition_addresses(ips: Vec<IpAddr>) -> (Vec<String>, Vec<String>) {
    let (private, public): (Vec<IpAddr>, Vec<IpAddr>) = ips.into_iter().partition(is_private);
    (
        public.iter().map(IpAddr::to_string).collect(),
        private.iter().map(IpAddr::to_string).collect(),
    )
}

fn is_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        // fc00::/7 unique local, fe80::/10 link local
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}

/// Reference to a catalog entry in `server show` output
///
/// Appears as a bare ID, as `name (id)`, or as an object with an `id` key.
pub fn reference_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(
            s.rsplit_once(" (")
                .and_then(|(_, id)| id.strip_suffix(')'))
                .unwrap_or(s.as_str())
                .to_string(),
        ),
        Value::Object(map) => map.get("id").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_rate_limit() {
        let e = classify_failure(
            &args(&["server", "create"]),
            "Rate limit exceeded for server creation (HTTP 429)",
        );
        assert!(matches!(e, OpenStackError::RateLimited(_)));
    }

    #[test]
    fn test_classify_missing_service() {
        let e = classify_failure(
            &args(&["network", "list", "-f", "json"]),
            "public endpoint for network service not found",
        );
        match e {
            OpenStackError::Unsupported(msg) => assert!(msg.starts_with("network list:")),
            other => panic!("Expected Unsupported, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_not_found() {
        let e = classify_failure(
            &args(&["server", "show", "abc"]),
            "No server with a name or ID of 'abc' exists.",
        );
        assert!(matches!(e, OpenStackError::NotFound(_)));

        let e = classify_failure(&args(&["server", "create"]), "Quota exceeded for cores");
        assert!(matches!(e, OpenStackError::CommandFailed(_)));

        let e = classify_failure(
            &args(&["volume", "delete", "abc"]),
            "Volume abc could not be found. (HTTP 404)",
        );
        assert!(matches!(e, OpenStackError::NotFound(_)));
    }

    #[test]
    fn test_parse_addresses_mapping() {
        let value = json!({"private": ["10.0.0.5", "203.0.113.9"], "v6": ["2001:db8::5"]});
        let (public, private) = partition_addresses(parse_addresses(&value));
        assert_eq!(public, vec!["203.0.113.9", "2001:db8::5"]);
        assert_eq!(private, vec!["10.0.0.5"]);
    }

    #[test]
    fn test_parse_addresses_string() {
        let value = json!("private=10.0.0.5, 203.0.113.9; storage=192.168.1.4");
        let ips: Vec<String> = parse_addresses(&value).iter().map(|ip| ip.to_string()).collect();
        assert_eq!(ips, vec!["10.0.0.5", "203.0.113.9", "192.168.1.4"]);
    }

    #[test]
    fn test_parse_addresses_nova_objects() {
        let value = json!({"net": [{"addr": "198.51.100.2", "version": 4}]});
        assert_eq!(parse_addresses(&value), vec!["198.51.100.2".parse::<IpAddr>().unwrap()]);
    }

    #[test]
    fn test_volume_attachment_forms() {
        let mut volume = VolumeSummary {
            id: "v1".into(),
            name: Some("node_0".into()),
            status: "in-use".into(),
            size: 10,
            attached_to: json!([{"server_id": "srv-1", "device": "/dev/vdb"}]),
        };
        assert_eq!(volume.server_id().as_deref(), Some("srv-1"));

        volume.attached_to = json!("Attached to srv-2 on /dev/vdb ");
        assert_eq!(volume.server_id().as_deref(), Some("srv-2"));

        volume.attached_to = json!("");
        assert_eq!(volume.server_id(), None);
    }

    #[test]
    fn test_reference_id_forms() {
        assert_eq!(reference_id(&json!("m1.small (3)")).as_deref(), Some("3"));
        assert_eq!(reference_id(&json!("abc-123")).as_deref(), Some("abc-123"));
        assert_eq!(reference_id(&json!({"id": "img"})).as_deref(), Some("img"));
        assert_eq!(reference_id(&json!("")), None);
    }
}

//! Catalog entries and remote resource handles
//!
//! Catalog types (`Image`, `Size`, `Network`, `SecurityGroup`) are read-only
//! snapshots fetched from the backend. `Node` and `Volume` are handles to
//! remote state and are never persisted.

use serde::{Deserialize, Serialize};

/// Bootable image offered by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub name: String,
}

/// Instance type (flavor)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub id: String,
    pub name: String,

    /// RAM in MB
    pub ram: u64,

    /// Root disk in GB
    pub disk: u64,

    pub vcpus: u32,
}

impl Size {
    /// Ordering key used to pick the cheapest adequate size
    pub fn cost_key(&self) -> (u64, u64, u32) {
        (self.ram, self.disk, self.vcpus)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
}

/// Running state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Pending,
    Running,
    Stopped,
    Error,
    Unknown,
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeState::Pending => write!(f, "pending"),
            NodeState::Running => write!(f, "running"),
            NodeState::Stopped => write!(f, "stopped"),
            NodeState::Error => write!(f, "error"),
            NodeState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Compute instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub state: NodeState,

    #[serde(default)]
    pub public_ips: Vec<String>,

    #[serde(default)]
    pub private_ips: Vec<String>,

    pub size_id: Option<String>,
    pub image_id: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            state: NodeState::Unknown,
            public_ips: Vec::new(),
            private_ips: Vec::new(),
            size_id: None,
            image_id: None,
        }
    }

    pub fn with_state(mut self, state: NodeState) -> Self {
        self.state = state;
        self
    }

    pub fn is_running(&self) -> bool {
        self.state == NodeState::Running
    }

    /// All addresses, public ones first
    pub fn ip_addresses(&self) -> Vec<String> {
        self.public_ips
            .iter()
            .chain(self.private_ips.iter())
            .cloned()
            .collect()
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.id, self.state)
    }
}

/// Block storage volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,
    pub name: String,

    /// Size in GB
    pub size: u64,

    /// ID of the node the volume is attached to
    pub attached_to: Option<String>,
}

impl Volume {
    pub fn is_attached(&self) -> bool {
        self.attached_to.is_some()
    }
}

impl std::fmt::Display for Volume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {}GB)", self.name, self.id, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_ip_addresses_public_first() {
        let mut node = Node::new("abc", "smithi001").with_state(NodeState::Running);
        node.private_ips.push("10.0.0.5".to_string());
        node.public_ips.push("203.0.113.7".to_string());

        assert!(node.is_running());
        assert_eq!(node.ip_addresses(), vec!["203.0.113.7", "10.0.0.5"]);
    }

    #[test]
    fn test_size_cost_key_orders_by_ram_then_disk() {
        let small = Size {
            id: "1".into(),
            name: "m1.small".into(),
            ram: 2048,
            disk: 80,
            vcpus: 4,
        };
        let large = Size {
            id: "2".into(),
            name: "m1.large".into(),
            ram: 8192,
            disk: 20,
            vcpus: 1,
        };
        assert!(small.cost_key() < large.cost_key());
    }
}

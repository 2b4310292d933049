//! Provisioning error types

use crate::dns::DnsError;
use crate::remote::RemoteError;
use nodeflow_cloud::CloudError;
use nodeflow_config::ConfigError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Invalid node name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Could not find an image for {os_type} {os_version}")]
    NoMatchingImage { os_type: String, os_version: String },

    #[error("No size offers ram >= {ram}MB, disk >= {disk}GB and cpus >= {cpus}")]
    NoMatchingSize { ram: u64, disk: u64, cpus: u32 },

    #[error("No security groups found with name '{0}'")]
    SecurityGroupNotFound(String),

    #[error("More than one security group found with name '{0}'")]
    AmbiguousSecurityGroup(String),

    #[error("More than one node found with name '{0}'")]
    AmbiguousNode(String),

    #[error("Node {0} was not reported as running")]
    NotRunning(String),

    #[error("Node {0} has no IP address")]
    NoAddress(String),

    /// Volumes were rolled back before this was returned
    #[error("Failed to create or attach volumes for {node}: {source}")]
    VolumeProvisioning {
        node: String,
        #[source]
        source: CloudError,
    },

    #[error("DNS update failed: {0}")]
    Dns(#[from] DnsError),

    #[error("{host} did not accept connections after {attempts} attempts: {source}")]
    Unreachable {
        host: String,
        attempts: u32,
        #[source]
        source: RemoteError,
    },

    #[error("Node {node} never became ready within {timeout:?}")]
    NeverReady { node: String, timeout: Duration },

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("User-data rendering failed: {0}")]
    UserData(#[from] serde_yaml::Error),

    #[error("Cloud error: {0}")]
    Cloud(#[from] CloudError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, ProvisionError>;

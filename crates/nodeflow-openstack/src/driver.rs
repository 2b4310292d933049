//! OpenStack compute driver implementation

use crate::cli::{
    CliRunner, FlavorInfo, ImageInfo, NamedInfo, OpenStackCli, ServerDetail, ServerSummary,
    VolumeDetail, VolumeSummary, args, parse_addresses, parse_list, partition_addresses,
    reference_id,
};
use crate::error::{OpenStackError, Result};
use async_trait::async_trait;
use nodeflow_cloud::{
    ComputeDriver, CreateNodeRequest, Image, Network, Node, NodeState, SecurityGroup, Size,
    Volume,
};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Polling used while waiting on server and volume status changes
#[derive(Debug, Clone)]
pub struct WaitConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(600),
        }
    }
}

fn node_state(status: &str) -> NodeState {
    match status.to_uppercase().as_str() {
        "ACTIVE" => NodeState::Running,
        "BUILD" | "REBUILD" | "REBOOT" | "HARD_REBOOT" | "RESIZE" => NodeState::Pending,
        "SHUTOFF" | "STOPPED" | "SUSPENDED" | "PAUSED" | "SHELVED" | "SHELVED_OFFLOADED" => {
            NodeState::Stopped
        }
        "ERROR" => NodeState::Error,
        _ => NodeState::Unknown,
    }
}

impl From<ServerSummary> for Node {
    fn from(server: ServerSummary) -> Self {
        let (public_ips, private_ips) = partition_addresses(parse_addresses(&server.networks));
        let mut node = Node::new(server.id, server.name).with_state(node_state(&server.status));
        node.public_ips = public_ips;
        node.private_ips = private_ips;
        node
    }
}

impl From<ServerDetail> for Node {
    fn from(server: ServerDetail) -> Self {
        let (public_ips, private_ips) = partition_addresses(parse_addresses(&server.addresses));
        let mut node = Node::new(server.id, server.name).with_state(node_state(&server.status));
        node.public_ips = public_ips;
        node.private_ips = private_ips;
        node.size_id = reference_id(&server.flavor);
        node.image_id = reference_id(&server.image);
        node
    }
}

impl From<VolumeSummary> for Volume {
    fn from(volume: VolumeSummary) -> Self {
        let attached_to = volume.server_id();
        Self {
            id: volume.id,
            name: volume.name.unwrap_or_default(),
            size: volume.size,
            attached_to,
        }
    }
}

/// OpenStack driver backed by the `openstack` CLI
pub struct OpenStackDriver {
    cli: Arc<dyn CliRunner>,
    wait: WaitConfig,
}

impl OpenStackDriver {
    pub fn new() -> Self {
        Self::with_runner(Arc::new(OpenStackCli::new()))
    }

    /// Use a named entry from clouds.yaml
    pub fn with_cloud(cloud: impl Into<String>) -> Self {
        Self::with_runner(Arc::new(OpenStackCli::with_cloud(cloud)))
    }

    pub fn with_runner(cli: Arc<dyn CliRunner>) -> Self {
        Self {
            cli,
            wait: WaitConfig::default(),
        }
    }

    pub fn with_wait(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    async fn run(&self, parts: &[&str]) -> Result<String> {
        self.cli.run(&args(parts)).await
    }

    async fn show_server(&self, id: &str) -> Result<ServerDetail> {
        let output = self.run(&["server", "show", id, "-f", "json"]).await?;
        Ok(serde_json::from_str(&output)?)
    }

    async fn show_volume(&self, id: &str) -> Result<VolumeDetail> {
        let output = self.run(&["volume", "show", id, "-f", "json"]).await?;
        Ok(serde_json::from_str(&output)?)
    }

    async fn wait_for_server(&self, id: &str) -> Result<ServerDetail> {
        let deadline = Instant::now() + self.wait.timeout;
        loop {
            // The server already exists, so throttling only delays the next poll
            match self.show_server(id).await {
                Ok(server) => match server.status.to_uppercase().as_str() {
                    "ACTIVE" => return Ok(server),
                    "ERROR" => {
                        return Err(OpenStackError::ServerFailed {
                            id: id.to_string(),
                            status: server.status,
                        });
                    }
                    status => tracing::debug!("Server {} is {}", id, status),
                },
                Err(OpenStackError::RateLimited(msg)) => {
                    tracing::debug!("Status poll for server {} throttled: {}", id, msg);
                }
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Err(OpenStackError::Timeout(format!("server {} to become ACTIVE", id)));
            }
            sleep(self.wait.interval).await;
        }
    }

    /// Poll until the volume reaches `wanted`
    async fn wait_for_volume(&self, id: &str, wanted: &str) -> Result<VolumeDetail> {
        let deadline = Instant::now() + self.wait.timeout;
        loop {
            match self.show_volume(id).await {
                Ok(volume) if volume.status == wanted => return Ok(volume),
                Ok(volume) if volume.status.starts_with("error") => {
                    return Err(OpenStackError::VolumeFailed {
                        id: id.to_string(),
                        status: volume.status,
                    });
                }
                Ok(volume) => tracing::debug!("Volume {} is {}", id, volume.status),
                Err(OpenStackError::RateLimited(msg)) => {
                    tracing::debug!("Status poll for volume {} throttled: {}", id, msg);
                }
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Err(OpenStackError::Timeout(format!("volume {} to become {}", id, wanted)));
            }
            sleep(self.wait.interval).await;
        }
    }
}

impl Default for OpenStackDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ComputeDriver for OpenStackDriver {
    fn name(&self) -> &str {
        "openstack"
    }

    async fn list_images(&self) -> nodeflow_cloud::Result<Vec<Image>> {
        let output = self.run(&["image", "list", "-f", "json"]).await?;
        let images: Vec<ImageInfo> = parse_list(&output)?;
        Ok(images
            .into_iter()
            .map(|i| Image {
                id: i.id,
                name: i.name,
            })
            .collect())
    }

    async fn list_sizes(&self) -> nodeflow_cloud::Result<Vec<Size>> {
        let output = self.run(&["flavor", "list", "-f", "json"]).await?;
        let flavors: Vec<FlavorInfo> = parse_list(&output)?;
        Ok(flavors
            .into_iter()
            .map(|f| Size {
                id: f.id,
                name: f.name,
                ram: f.ram,
                disk: f.disk,
                vcpus: f.vcpus,
            })
            .collect())
    }

    async fn list_networks(&self) -> nodeflow_cloud::Result<Vec<Network>> {
        let output = self.run(&["network", "list", "-f", "json"]).await?;
        let networks: Vec<NamedInfo> = parse_list(&output)?;
        Ok(networks
            .into_iter()
            .map(|n| Network {
                id: n.id,
                name: n.name,
            })
            .collect())
    }

    async fn list_security_groups(&self) -> nodeflow_cloud::Result<Vec<SecurityGroup>> {
        let output = self.run(&["security", "group", "list", "-f", "json"]).await?;
        let groups: Vec<NamedInfo> = parse_list(&output)?;
        Ok(groups
            .into_iter()
            .map(|g| SecurityGroup {
                id: g.id,
                name: g.name,
            })
            .collect())
    }

    async fn list_nodes(&self) -> nodeflow_cloud::Result<Vec<Node>> {
        let output = self.run(&["server", "list", "-f", "json"]).await?;
        let servers: Vec<ServerSummary> = parse_list(&output)?;
        Ok(servers.into_iter().map(Node::from).collect())
    }

    async fn create_node(&self, request: &CreateNodeRequest) -> nodeflow_cloud::Result<Node> {
        // The CLI only reads user-data from a file
        let mut user_data = tempfile::NamedTempFile::new().map_err(OpenStackError::from)?;
        user_data
            .write_all(request.user_data.as_bytes())
            .map_err(OpenStackError::from)?;
        let user_data_path = user_data.path().to_string_lossy().to_string();

        let mut parts = vec![
            "server",
            "create",
            "--flavor",
            request.size.id.as_str(),
            "--image",
            request.image.id.as_str(),
            "--user-data",
            user_data_path.as_str(),
            "-f",
            "json",
        ];

        let nics: Vec<String> = request
            .networks
            .iter()
            .flatten()
            .map(|n| format!("net-id={}", n.id))
            .collect();
        for nic in &nics {
            parts.push("--nic");
            parts.push(nic.as_str());
        }

        for group in request.security_groups.iter().flatten() {
            parts.push("--security-group");
            parts.push(group.id.as_str());
        }

        parts.push(request.name.as_str());

        let output = self.run(&parts).await?;
        let server: ServerDetail = serde_json::from_str(&output).map_err(OpenStackError::from)?;
        tracing::debug!("Requested server {} ({})", server.name, server.id);
        Ok(server.into())
    }

    async fn wait_until_running(
        &self,
        nodes: &[Node],
    ) -> nodeflow_cloud::Result<Vec<(Node, Vec<String>)>> {
        let mut running = Vec::with_capacity(nodes.len());
        for node in nodes {
            let node: Node = self.wait_for_server(&node.id).await?.into();
            let ips = node.ip_addresses();
            running.push((node, ips));
        }
        Ok(running)
    }

    async fn list_volumes(&self) -> nodeflow_cloud::Result<Vec<Volume>> {
        let output = self.run(&["volume", "list", "-f", "json"]).await?;
        let volumes: Vec<VolumeSummary> = parse_list(&output)?;
        Ok(volumes.into_iter().map(Volume::from).collect())
    }

    async fn create_volume(&self, size: u64, name: &str) -> nodeflow_cloud::Result<Volume> {
        let size_arg = size.to_string();
        let output = self
            .run(&["volume", "create", "--size", size_arg.as_str(), "-f", "json", name])
            .await?;
        let created: VolumeDetail = serde_json::from_str(&output).map_err(OpenStackError::from)?;

        // Attaching a volume that is still being created fails
        let volume = self.wait_for_volume(&created.id, "available").await?;
        Ok(Volume {
            id: volume.id,
            name: volume.name.unwrap_or_else(|| name.to_string()),
            size: volume.size,
            attached_to: None,
        })
    }

    async fn attach_volume(
        &self,
        node: &Node,
        volume: &Volume,
        device: Option<&str>,
    ) -> nodeflow_cloud::Result<()> {
        let mut parts = vec!["server", "add", "volume"];
        if let Some(device) = device {
            parts.push("--device");
            parts.push(device);
        }
        parts.push(node.id.as_str());
        parts.push(volume.id.as_str());
        self.run(&parts).await?;

        self.wait_for_volume(&volume.id, "in-use").await?;
        Ok(())
    }

    async fn detach_volume(&self, volume: &Volume) -> nodeflow_cloud::Result<()> {
        let Some(server_id) = volume.attached_to.as_deref() else {
            return Ok(());
        };
        self.run(&["server", "remove", "volume", server_id, volume.id.as_str()])
            .await?;
        self.wait_for_volume(&volume.id, "available").await?;
        Ok(())
    }

    async fn destroy_volume(&self, volume: &Volume) -> nodeflow_cloud::Result<()> {
        self.run(&["volume", "delete", volume.id.as_str()]).await?;
        Ok(())
    }

    async fn destroy_node(&self, node: &Node) -> nodeflow_cloud::Result<bool> {
        match self.run(&["server", "delete", "--wait", node.id.as_str()]).await {
            Ok(_) => Ok(true),
            Err(OpenStackError::NotFound(msg)) => {
                tracing::warn!("Server {} already gone: {}", node.name, msg);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

//! Compute driver trait definition

use crate::error::{CloudError, Result};
use crate::model::{Image, Network, Node, SecurityGroup, Size, Volume};
use async_trait::async_trait;

/// Compute backend capability surface
///
/// Backends (the OpenStack CLI driver, test doubles, ...) implement this
/// trait so the orchestrator can list catalogs and create, attach and
/// destroy resources without knowing how the backend is reached.
///
/// Errors signalling throttling must be reported as
/// [`CloudError::RateLimited`] so the retry wrapper can recognise them.
#[async_trait]
pub trait ComputeDriver: Send + Sync {
    /// Returns the backend family (e.g., "openstack"), used to pick the
    /// configuration section.
    fn name(&self) -> &str;

    async fn list_images(&self) -> Result<Vec<Image>>;

    async fn list_sizes(&self) -> Result<Vec<Size>>;

    /// Optional capability. Backends without networks keep the default.
    async fn list_networks(&self) -> Result<Vec<Network>> {
        Err(CloudError::Unsupported(format!(
            "{} cannot list networks",
            self.name()
        )))
    }

    /// Optional capability. Backends without security groups keep the default.
    async fn list_security_groups(&self) -> Result<Vec<SecurityGroup>> {
        Err(CloudError::Unsupported(format!(
            "{} cannot list security groups",
            self.name()
        )))
    }

    async fn list_nodes(&self) -> Result<Vec<Node>>;

    async fn create_node(&self, request: &CreateNodeRequest) -> Result<Node>;

    /// Block until every node is running, returning each with its addresses
    async fn wait_until_running(&self, nodes: &[Node]) -> Result<Vec<(Node, Vec<String>)>>;

    async fn list_volumes(&self) -> Result<Vec<Volume>>;

    async fn create_volume(&self, size: u64, name: &str) -> Result<Volume>;

    /// Attach a volume; `None` lets the backend pick the device
    async fn attach_volume(&self, node: &Node, volume: &Volume, device: Option<&str>)
    -> Result<()>;

    async fn detach_volume(&self, volume: &Volume) -> Result<()>;

    async fn destroy_volume(&self, volume: &Volume) -> Result<()>;

    async fn destroy_node(&self, node: &Node) -> Result<bool>;
}

/// Arguments for [`ComputeDriver::create_node`]
#[derive(Debug, Clone)]
pub struct CreateNodeRequest {
    pub name: String,
    pub size: Size,
    pub image: Image,

    /// Boot-time user-data document
    pub user_data: String,

    /// Only set when the backend reported at least one network
    pub networks: Option<Vec<Network>>,

    /// Only set when security groups were requested
    pub security_groups: Option<Vec<SecurityGroup>>,
}

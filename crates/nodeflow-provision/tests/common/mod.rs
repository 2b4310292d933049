use async_trait::async_trait;
use nodeflow_cloud::{
    CloudError, ComputeDriver, CreateNodeRequest, Image, Network, Node, NodeState, Provider,
    ProviderConf, Result, RetryConfig, SecurityGroup, Size, Volume,
};
use nodeflow_provision::{DnsError, DnsUpdater, RemoteError, RemoteTransport};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Backend state shared between a test and the fake driver
#[derive(Default)]
pub struct CloudState {
    pub nodes: Vec<Node>,
    pub volumes: Vec<Volume>,
    pub created: Vec<CreateNodeRequest>,
    pub calls: Vec<String>,
    next_id: u32,
}

/// In-memory compute backend
#[derive(Default)]
pub struct FakeCloud {
    pub state: Mutex<CloudState>,
    pub images: Vec<Image>,
    pub sizes: Vec<Size>,
    pub networks: Option<Vec<Network>>,
    pub security_groups: Option<Vec<SecurityGroup>>,

    /// 1-based index of the create_volume call that fails
    pub fail_volume_create: Option<u32>,

    /// Volume names whose detach or destroy is refused
    pub fail_volume_detach: Option<String>,
    pub fail_volume_destroy: Option<String>,

    /// Number of create_node calls answered with a throttling error
    pub throttle_create: AtomicU32,

    /// Report the node as never having started
    pub never_running: bool,

    pub volume_creates: AtomicU32,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self {
            images: vec![
                Image {
                    id: "img-1".into(),
                    name: "Ubuntu 22.04 LTS".into(),
                },
                Image {
                    id: "img-2".into(),
                    name: "centos-9-stream".into(),
                },
            ],
            sizes: vec![
                size("m1.small", 2048, 20, 1),
                size("m1.large", 8192, 40, 4),
                size("m1.medium", 8000, 20, 2),
            ],
            ..Default::default()
        }
    }

    pub fn with_node(self, id: &str, name: &str) -> Self {
        self.lock()
            .nodes
            .push(Node::new(id, name).with_state(NodeState::Running));
        self
    }

    pub fn with_volume(self, name: &str, attached_to: Option<&str>) -> Self {
        self.lock().volumes.push(Volume {
            id: format!("vol-{}", name),
            name: name.to_string(),
            size: 10,
            attached_to: attached_to.map(str::to_string),
        });
        self
    }

    pub fn lock(&self) -> std::sync::MutexGuard<'_, CloudState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self, name: &str) -> usize {
        self.lock().calls.iter().filter(|c| c.as_str() == name).count()
    }

    pub fn call_log(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn volume_names(&self) -> Vec<String> {
        self.lock().volumes.iter().map(|v| v.name.clone()).collect()
    }

    fn record(&self, call: &str) {
        self.lock().calls.push(call.to_string());
    }
}

pub fn size(name: &str, ram: u64, disk: u64, vcpus: u32) -> Size {
    Size {
        id: format!("flavor-{}", name),
        name: name.to_string(),
        ram,
        disk,
        vcpus,
    }
}

#[async_trait]
impl ComputeDriver for FakeCloud {
    fn name(&self) -> &str {
        "openstack"
    }

    async fn list_images(&self) -> Result<Vec<Image>> {
        self.record("list_images");
        Ok(self.images.clone())
    }

    async fn list_sizes(&self) -> Result<Vec<Size>> {
        self.record("list_sizes");
        Ok(self.sizes.clone())
    }

    async fn list_networks(&self) -> Result<Vec<Network>> {
        self.record("list_networks");
        self.networks
            .clone()
            .ok_or_else(|| CloudError::Unsupported("no network service".into()))
    }

    async fn list_security_groups(&self) -> Result<Vec<SecurityGroup>> {
        self.record("list_security_groups");
        self.security_groups
            .clone()
            .ok_or_else(|| CloudError::Unsupported("no security groups".into()))
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.record("list_nodes");
        Ok(self.lock().nodes.clone())
    }

    async fn create_node(&self, request: &CreateNodeRequest) -> Result<Node> {
        self.record("create_node");
        if self.throttle_create.load(Ordering::SeqCst) > 0 {
            self.throttle_create.fetch_sub(1, Ordering::SeqCst);
            return Err(CloudError::RateLimited("429 Too Many Requests".into()));
        }

        let mut state = self.lock();
        state.next_id += 1;
        let mut node = Node::new(format!("srv-{}", state.next_id), &request.name)
            .with_state(NodeState::Pending);
        node.size_id = Some(request.size.id.clone());
        node.image_id = Some(request.image.id.clone());
        state.nodes.push(node.clone());
        state.created.push(request.clone());
        Ok(node)
    }

    async fn wait_until_running(&self, nodes: &[Node]) -> Result<Vec<(Node, Vec<String>)>> {
        self.record("wait_until_running");
        if self.never_running {
            return Ok(Vec::new());
        }
        Ok(nodes
            .iter()
            .map(|n| {
                let mut node = n.clone().with_state(NodeState::Running);
                node.public_ips = vec!["203.0.113.7".into()];
                node.private_ips = vec!["10.0.0.7".into()];
                let ips = node.ip_addresses();
                (node, ips)
            })
            .collect())
    }

    async fn list_volumes(&self) -> Result<Vec<Volume>> {
        self.record("list_volumes");
        Ok(self.lock().volumes.clone())
    }

    async fn create_volume(&self, size: u64, name: &str) -> Result<Volume> {
        self.record("create_volume");
        let n = self.volume_creates.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_volume_create == Some(n) {
            return Err(CloudError::ApiError("VolumeLimitExceeded".into()));
        }

        let volume = Volume {
            id: format!("vol-{}", name),
            name: name.to_string(),
            size,
            attached_to: None,
        };
        self.lock().volumes.push(volume.clone());
        Ok(volume)
    }

    async fn attach_volume(
        &self,
        node: &Node,
        volume: &Volume,
        _device: Option<&str>,
    ) -> Result<()> {
        self.record("attach_volume");
        let mut state = self.lock();
        let stored = state
            .volumes
            .iter_mut()
            .find(|v| v.id == volume.id)
            .ok_or_else(|| CloudError::ResourceNotFound(volume.id.clone()))?;
        stored.attached_to = Some(node.id.clone());
        Ok(())
    }

    async fn detach_volume(&self, volume: &Volume) -> Result<()> {
        self.record("detach_volume");
        if self.fail_volume_detach.as_deref() == Some(volume.name.as_str()) {
            return Err(CloudError::ApiError(format!("{} is busy", volume.name)));
        }
        if let Some(stored) = self.lock().volumes.iter_mut().find(|v| v.id == volume.id) {
            stored.attached_to = None;
        }
        Ok(())
    }

    async fn destroy_volume(&self, volume: &Volume) -> Result<()> {
        self.record("destroy_volume");
        if self.fail_volume_destroy.as_deref() == Some(volume.name.as_str()) {
            return Err(CloudError::ApiError(format!("{} could not be deleted", volume.name)));
        }
        let mut state = self.lock();
        if let Some(stored) = state.volumes.iter().find(|v| v.id == volume.id) {
            if stored.attached_to.is_some() {
                return Err(CloudError::ApiError(format!("{} is in use", volume.name)));
            }
        }
        state.volumes.retain(|v| v.id != volume.id);
        Ok(())
    }

    async fn destroy_node(&self, node: &Node) -> Result<bool> {
        self.record("destroy_node");
        let mut state = self.lock();
        let before = state.nodes.len();
        state.nodes.retain(|n| n.id != node.id);
        Ok(state.nodes.len() < before)
    }
}

pub fn provider(cloud: &Arc<FakeCloud>, conf: ProviderConf) -> Provider {
    Provider::new(cloud.clone(), conf)
        .unwrap()
        .with_retry(RetryConfig::immediate(24))
}

/// Remote that refuses the first `refusals` connections
#[derive(Default)]
pub struct FakeRemote {
    pub refusals: AtomicU32,
    pub connects: AtomicU32,
    pub sentinel_never_appears: bool,
    pub commands: Mutex<Vec<String>>,
}

impl FakeRemote {
    pub fn refusing(refusals: u32) -> Self {
        Self {
            refusals: AtomicU32::new(refusals),
            ..Default::default()
        }
    }
}

#[async_trait]
impl RemoteTransport for FakeRemote {
    fn target(&self) -> String {
        "ubuntu@fake".to_string()
    }

    async fn connect(&self) -> std::result::Result<(), RemoteError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refusals.load(Ordering::SeqCst) > 0 {
            self.refusals.fetch_sub(1, Ordering::SeqCst);
            return Err(RemoteError::Connection("Connection refused".into()));
        }
        Ok(())
    }

    async fn run(
        &self,
        command: &str,
        timeout: Duration,
    ) -> std::result::Result<String, RemoteError> {
        self.commands.lock().unwrap().push(command.to_string());
        if self.sentinel_never_appears {
            return Err(RemoteError::Timeout(timeout));
        }
        Ok(String::new())
    }
}

/// DNS endpoint that records updates
#[derive(Default)]
pub struct FakeDns {
    pub updates: Mutex<Vec<(String, String)>>,
    pub reject: bool,
}

#[async_trait]
impl DnsUpdater for FakeDns {
    async fn update(&self, name: &str, ip: &str) -> std::result::Result<(), DnsError> {
        if self.reject {
            return Err(DnsError::Rejected {
                status: 500,
                body: "zone locked".into(),
            });
        }
        self.updates
            .lock()
            .unwrap()
            .push((name.to_string(), ip.to_string()));
        Ok(())
    }
}

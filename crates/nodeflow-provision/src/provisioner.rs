//! Node provisioning state machine and destruction workflow

use crate::dns::DnsUpdater;
use crate::error::{ProvisionError, Result};
use crate::remote::{RemoteError, RemoteTransport};
use crate::selector::{resolve_security_groups, select_image, select_size};
use crate::userdata::{self, SENTINEL_PATH};
use crate::volumes::{owned_volumes, volume_names};
use nodeflow_cloud::{CreateNodeRequest, Image, Node, Provider, SecurityGroup, Size};
use nodeflow_config::EffectiveConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// What the caller wants built
#[derive(Debug, Clone)]
pub struct ProvisioningRequest {
    /// Node name; also its hostname and DNS label
    pub name: String,
    pub os_type: String,
    pub os_version: String,

    /// Administrative user created by cloud-init
    pub user: String,

    /// Public key installed for `user`
    pub ssh_pubkey: Option<String>,
}

impl ProvisioningRequest {
    pub fn new(
        name: impl Into<String>,
        os_type: impl Into<String>,
        os_version: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self {
            name,
            os_type: os_type.into(),
            os_version: os_version.into(),
            user: "ubuntu".to_string(),
            ssh_pubkey: None,
        })
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_ssh_pubkey(mut self, key: impl Into<String>) -> Self {
        self.ssh_pubkey = Some(key.into());
        self
    }

    pub fn hostname(&self) -> &str {
        &self.name
    }
}

/// Names must work as a cloud resource name and as a DNS label
fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| ProvisionError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() || name.len() > 63 {
        return Err(invalid("must be 1 to 63 characters long"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(invalid("only letters, digits and '-' are allowed"));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(invalid("must not start or end with '-'"));
    }
    Ok(())
}

/// Timing of the readiness check after DNS registration
#[derive(Debug, Clone)]
pub struct ReadinessConfig {
    /// Time given to cloud-init to bring up networking, sshd and the key
    pub boot_grace: Duration,

    pub connect_attempts: u32,
    pub connect_interval: Duration,

    /// Upper bound on waiting for the sentinel once connected
    pub sentinel_timeout: Duration,
    pub sentinel_poll: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            boot_grace: Duration::from_secs(20),
            connect_attempts: 20,
            connect_interval: Duration::from_secs(6),
            sentinel_timeout: Duration::from_secs(600),
            sentinel_poll: Duration::from_secs(5),
        }
    }
}

impl ReadinessConfig {
    /// No grace period and no pause between connection attempts
    pub fn immediate() -> Self {
        Self {
            boot_grace: Duration::ZERO,
            connect_interval: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Provisioning progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionState {
    Requested,
    Creating,
    AwaitingRunning,
    ProvisioningVolumes,
    UpdatingDns,
    AwaitingReady,
    Ready,
    Failed,
}

impl std::fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProvisionState::Requested => write!(f, "requested"),
            ProvisionState::Creating => write!(f, "creating"),
            ProvisionState::AwaitingRunning => write!(f, "awaiting-running"),
            ProvisionState::ProvisioningVolumes => write!(f, "provisioning-volumes"),
            ProvisionState::UpdatingDns => write!(f, "updating-dns"),
            ProvisionState::AwaitingReady => write!(f, "awaiting-ready"),
            ProvisionState::Ready => write!(f, "ready"),
            ProvisionState::Failed => write!(f, "failed"),
        }
    }
}

/// Creates and destroys one named node on one provider
pub struct Provisioner {
    provider: Provider,
    request: ProvisioningRequest,
    conf: EffectiveConfig,
    remote: Arc<dyn RemoteTransport>,
    dns: Option<Arc<dyn DnsUpdater>>,
    readiness: ReadinessConfig,
    state: ProvisionState,
    node: Option<Node>,
    ips: Vec<String>,
}

impl Provisioner {
    pub fn new(
        provider: Provider,
        request: ProvisioningRequest,
        conf: EffectiveConfig,
        remote: Arc<dyn RemoteTransport>,
    ) -> Self {
        Self {
            provider,
            request,
            conf,
            remote,
            dns: None,
            readiness: ReadinessConfig::default(),
            state: ProvisionState::Requested,
            node: None,
            ips: Vec::new(),
        }
    }

    pub fn with_dns(mut self, dns: Arc<dyn DnsUpdater>) -> Self {
        self.dns = Some(dns);
        self
    }

    pub fn with_readiness(mut self, readiness: ReadinessConfig) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn request(&self) -> &ProvisioningRequest {
        &self.request
    }

    pub fn conf(&self) -> &EffectiveConfig {
        &self.conf
    }

    pub fn state(&self) -> ProvisionState {
        self.state
    }

    /// Addresses reported when the node started
    pub fn ips(&self) -> &[String] {
        &self.ips
    }

    pub async fn image(&self) -> Result<Image> {
        let images = self.provider.images().await?;
        select_image(images, &self.request.os_type, &self.request.os_version).cloned()
    }

    pub async fn size(&self) -> Result<Size> {
        let sizes = self.provider.sizes().await?;
        select_size(sizes, &self.conf.machine).cloned()
    }

    /// Groups named in the provider config; `None` when none were named
    pub async fn security_groups(&self) -> Result<Option<Vec<SecurityGroup>>> {
        let Some(names) = self.provider.conf().security_groups.as_deref() else {
            return Ok(None);
        };
        let catalog = self.provider.security_groups().await?;
        resolve_security_groups(catalog, Some(names))
    }

    pub fn userdata(&self) -> Result<String> {
        let extra_packages: Vec<String> = self
            .conf
            .extra
            .get("packages")
            .and_then(|p| p.as_array())
            .map(|p| {
                p.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Ok(userdata::render(
            &self.request.user,
            self.request.hostname(),
            &extra_packages,
            self.request.ssh_pubkey.as_deref(),
        )?)
    }

    /// Look the node up by exact name
    ///
    /// A match is cached for the rest of the session; a miss is not, so the
    /// next call asks the backend again.
    pub async fn node(&mut self) -> Result<Option<&Node>> {
        if self.node.is_none() {
            let nodes = self
                .provider
                .call("list_nodes", || self.provider.driver().list_nodes())
                .await?;

            let mut matches = nodes.into_iter().filter(|n| n.name == self.request.name);
            match (matches.next(), matches.next()) {
                (None, _) => {
                    tracing::warn!("No nodes found with name '{}'", self.request.name);
                    return Ok(None);
                }
                (Some(_), Some(_)) => {
                    return Err(ProvisionError::AmbiguousNode(self.request.name.clone()));
                }
                (Some(node), None) => self.node = Some(node),
            }
        }
        Ok(self.node.as_ref())
    }

    /// Create the node and wait until it is ready for use
    ///
    /// A failure while creating or attaching volumes removes every volume
    /// carrying the node's name prefix before the error is returned.
    pub async fn create(&mut self) -> Result<Node> {
        tracing::info!("Creating node: {}", self.request.name);
        match self.run_create().await {
            Ok(node) => {
                self.transition(ProvisionState::Ready);
                Ok(node)
            }
            Err(e) => {
                self.transition(ProvisionState::Failed);
                Err(e)
            }
        }
    }

    async fn run_create(&mut self) -> Result<Node> {
        self.transition(ProvisionState::Creating);

        let size = self.size().await?;
        tracing::debug!(
            "Selected size: {} ({}MB, {}GB, {} vcpus)",
            size.name,
            size.ram,
            size.disk,
            size.vcpus
        );
        let image = self.image().await?;
        tracing::debug!("Selected image: {}", image.name);

        let networks = self.provider.networks().await?;
        let request = CreateNodeRequest {
            name: self.request.name.clone(),
            size,
            image,
            user_data: self.userdata()?,
            networks: (!networks.is_empty()).then(|| networks.to_vec()),
            security_groups: self.security_groups().await?.filter(|g| !g.is_empty()),
        };

        let node = self
            .provider
            .call("create_node", || self.provider.driver().create_node(&request))
            .await?;
        tracing::debug!("Created node: {}", node);
        self.node = Some(node.clone());

        self.transition(ProvisionState::AwaitingRunning);
        let mut running = self
            .provider
            .call("wait_until_running", || {
                self.provider
                    .driver()
                    .wait_until_running(std::slice::from_ref(&node))
            })
            .await?;
        if running.is_empty() {
            return Err(ProvisionError::NotRunning(self.request.name.clone()));
        }
        let (node, ips) = running.swap_remove(0);
        tracing::info!("Node started: {} {:?}", node, ips);
        self.node = Some(node.clone());
        self.ips = ips;

        self.transition(ProvisionState::ProvisioningVolumes);
        if let Err(e) = self.create_volumes(&node).await {
            tracing::error!("Failed to create or attach volume: {}", e);
            if let Err(cleanup) = self.destroy_volumes().await {
                tracing::error!(
                    "Could not list volumes of {} for cleanup: {}",
                    self.request.name,
                    cleanup
                );
            }
            return Err(ProvisionError::VolumeProvisioning {
                node: self.request.name.clone(),
                source: e,
            });
        }

        // DNS failures are not rolled back; the node and volumes stay for
        // inspection and are removed by destroy().
        self.transition(ProvisionState::UpdatingDns);
        self.update_dns().await?;

        self.transition(ProvisionState::AwaitingReady);
        self.wait_for_ready().await?;

        Ok(node)
    }

    async fn create_volumes(&self, node: &Node) -> nodeflow_cloud::Result<()> {
        let count = self.conf.volumes.count;
        let size = self.conf.volumes.size;

        for name in volume_names(&self.request.name, count) {
            let volume = self
                .provider
                .call("create_volume", || self.provider.driver().create_volume(size, &name))
                .await?;
            tracing::info!("Created volume {}", volume);

            self.provider
                .call("attach_volume", || {
                    self.provider.driver().attach_volume(node, &volume, None)
                })
                .await?;
        }
        Ok(())
    }

    /// Detach and destroy every volume owned by this node
    ///
    /// Per-volume failures are logged and do not stop the sweep. Only a
    /// failure to list volumes is returned.
    async fn destroy_volumes(&self) -> nodeflow_cloud::Result<()> {
        let all_volumes = self
            .provider
            .call("list_volumes", || self.provider.driver().list_volumes())
            .await?;

        // Drivers treat detaching an unattached volume as a no-op
        for volume in owned_volumes(&all_volumes, &self.request.name) {
            if let Err(e) = self
                .provider
                .call("detach_volume", || self.provider.driver().detach_volume(volume))
                .await
            {
                tracing::error!("Could not detach volume {}: {}", volume, e);
            }
            match self
                .provider
                .call("destroy_volume", || self.provider.driver().destroy_volume(volume))
                .await
            {
                Ok(()) => tracing::info!("Destroyed volume {}", volume),
                Err(e) => tracing::error!("Could not destroy volume {}: {}", volume, e),
            }
        }
        Ok(())
    }

    async fn update_dns(&self) -> Result<()> {
        let Some(dns) = &self.dns else {
            tracing::warn!(
                "No DNS endpoint configured, not registering {}",
                self.request.name
            );
            return Ok(());
        };
        let ip = self
            .ips
            .first()
            .ok_or_else(|| ProvisionError::NoAddress(self.request.name.clone()))?;
        dns.update(&self.request.name, ip).await?;
        Ok(())
    }

    async fn wait_for_ready(&self) -> Result<()> {
        let readiness = &self.readiness;
        sleep(readiness.boot_grace).await;

        let max_attempts = readiness.connect_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.remote.connect().await {
                Ok(()) => break,
                Err(e) if e.is_not_ready() => {
                    if attempt >= max_attempts {
                        return Err(ProvisionError::Unreachable {
                            host: self.remote.target(),
                            attempts: attempt,
                            source: e,
                        });
                    }
                    tracing::debug!(
                        "{} not reachable yet ({}/{}): {}",
                        self.remote.target(),
                        attempt,
                        max_attempts,
                        e
                    );
                    sleep(readiness.connect_interval).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        let command = format!(
            "while [ ! -e '{}' ]; do sleep {}; done",
            SENTINEL_PATH,
            readiness.sentinel_poll.as_secs().max(1)
        );
        match self.remote.run(&command, readiness.sentinel_timeout).await {
            Ok(_) => {}
            Err(RemoteError::Timeout(timeout)) => {
                return Err(ProvisionError::NeverReady {
                    node: self.request.name.clone(),
                    timeout,
                });
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!("Node is ready: {}", self.request.name);
        Ok(())
    }

    /// Destroy the node and its volumes
    ///
    /// A node that does not exist counts as destroyed.
    pub async fn destroy(&mut self) -> Result<bool> {
        let node = match self.node().await? {
            Some(node) => node.clone(),
            None => return Ok(true),
        };

        tracing::info!("Destroying node: {}", node);
        self.destroy_volumes().await?;

        let destroyed = self
            .provider
            .call("destroy_node", || self.provider.driver().destroy_node(&node))
            .await?;
        if destroyed {
            self.node = None;
            self.ips.clear();
        }
        Ok(destroyed)
    }

    fn transition(&mut self, next: ProvisionState) {
        tracing::debug!("{}: {} -> {}", self.request.name, self.state, next);
        self.state = next;
    }
}

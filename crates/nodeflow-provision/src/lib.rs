//! nodeflow provisioning orchestrator
//!
//! Drives a [`nodeflow_cloud::Provider`] through the lifecycle of one named
//! node: resource selection, creation, volume attachment with rollback,
//! DNS registration, readiness polling and destruction.
//!
//! ```text
//! Requested -> Creating -> AwaitingRunning -> ProvisioningVolumes
//!           -> UpdatingDns -> AwaitingReady -> Ready
//!
//! any step may end in Failed
//! ```

pub mod dns;
pub mod error;
pub mod provisioner;
pub mod remote;
pub mod selector;
pub mod userdata;
pub mod volumes;

// Re-exports
pub use dns::{DnsError, DnsUpdater, NsUpdateClient};
pub use error::{ProvisionError, Result};
pub use provisioner::{ProvisionState, Provisioner, ProvisioningRequest, ReadinessConfig};
pub use remote::{RemoteError, RemoteTransport, SshRemote};
pub use selector::{resolve_security_groups, select_image, select_size};
pub use userdata::SENTINEL_PATH;
pub use volumes::{owned_volumes, volume_names};

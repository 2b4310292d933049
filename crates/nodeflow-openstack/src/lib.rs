//! OpenStack compute driver for nodeflow
//!
//! This crate implements the `ComputeDriver` trait for OpenStack clouds
//! by wrapping the `openstack` command line client.
//!
//! # Features
//!
//! - Image, flavor, network and security group catalogs
//! - Server creation with user-data, status polling and deletion
//! - Volume creation, attachment, detachment and deletion
//!
//! # Requirements
//!
//! - `openstack` CLI (python-openstackclient) must be installed
//! - Credentials come from `OS_*` variables or a `clouds.yaml` entry
//!
//! # Example
//!
//! ```ignore
//! use nodeflow_cloud::{ComputeDriver, Provider, ProviderConf};
//! use nodeflow_openstack::OpenStackDriver;
//! use std::sync::Arc;
//!
//! let provider = Provider::new(Arc::new(OpenStackDriver::new()), ProviderConf::default())?;
//! for size in provider.sizes().await? {
//!     println!("{} {}MB", size.name, size.ram);
//! }
//! ```

pub mod cli;
pub mod driver;
pub mod error;

pub use cli::{CliRunner, OpenStackCli};
pub use driver::{OpenStackDriver, WaitConfig};
pub use error::{OpenStackError, Result};

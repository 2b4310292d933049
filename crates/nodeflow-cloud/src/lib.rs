//! nodeflow cloud backend abstraction
//!
//! This crate provides the compute backend abstraction that the provisioning
//! orchestrator drives: the catalog and entity model, the `ComputeDriver`
//! capability trait, the transient-error retry policy and the per-session
//! `Provider` handle that caches catalogs.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │             nodeflow-provision                   │
//! │     (selector, state machine, destruction)       │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               nodeflow-cloud                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │   Provider (cached catalogs + retry)      │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │   trait ComputeDriver { ... }             │   │
//! │  └──────────────────────────────────────────┘   │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────┐
//! │   openstack   │
//! │    driver     │
//! └───────────────┘
//! ```

pub mod driver;
pub mod error;
pub mod model;
pub mod provider;
pub mod retry;

// Re-exports
pub use driver::{ComputeDriver, CreateNodeRequest};
pub use error::{CloudError, Result};
pub use model::{Image, Network, Node, NodeState, SecurityGroup, Size, Volume};
pub use provider::{Provider, ProviderConf};
pub use retry::{RetryConfig, retry};

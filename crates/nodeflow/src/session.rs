//! Backend wiring shared by every subcommand

use anyhow::Context;
use clap::ValueEnum;
use nodeflow_cloud::{ComputeDriver, Provider, ProviderConf};
use nodeflow_config::GlobalConfig;
use nodeflow_openstack::OpenStackDriver;
use std::sync::Arc;

/// Shipped backend families
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Driver {
    Openstack,
}

pub fn driver(driver: Driver, os_cloud: Option<&str>) -> Arc<dyn ComputeDriver> {
    match driver {
        Driver::Openstack => match os_cloud {
            Some(cloud) => Arc::new(OpenStackDriver::with_cloud(cloud)),
            None => Arc::new(OpenStackDriver::new()),
        },
    }
}

/// Provider handle configured from the family's config section
pub fn provider(
    global: &GlobalConfig,
    driver: Driver,
    os_cloud: Option<&str>,
) -> anyhow::Result<Provider> {
    let driver = self::driver(driver, os_cloud);
    let conf: ProviderConf = global
        .section(driver.name())
        .with_context(|| format!("Invalid '{}' section", driver.name()))?;
    Ok(Provider::new(driver, conf)?)
}

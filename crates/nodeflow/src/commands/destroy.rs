use anyhow::Context;
use colored::Colorize;
use nodeflow_cloud::Provider;
use nodeflow_config::EffectiveConfig;
use nodeflow_provision::{Provisioner, ProvisioningRequest, SshRemote};
use std::sync::Arc;

pub async fn handle(provider: Provider, name: &str) -> anyhow::Result<()> {
    // image and sizing are irrelevant when tearing down
    let request = ProvisioningRequest::new(name, "", "")?;
    let remote = Arc::new(SshRemote::new(&request.user, name));
    let mut provisioner = Provisioner::new(provider, request, EffectiveConfig::default(), remote);

    println!("{}", format!("Destroying {}...", name).blue());
    let destroyed = provisioner
        .destroy()
        .await
        .with_context(|| format!("Failed to destroy {}", name))?;

    if destroyed {
        println!("{}", format!("✓ {} destroyed", name).green());
        Ok(())
    } else {
        anyhow::bail!("The backend did not confirm destruction of {}", name)
    }
}

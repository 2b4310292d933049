use crate::utils::{self, Overrides};
use anyhow::Context;
use clap::Args;
use colored::Colorize;
use nodeflow_cloud::Provider;
use nodeflow_config::{GlobalConfig, default_sizing, resolve};
use nodeflow_provision::{NsUpdateClient, Provisioner, ProvisioningRequest, SshRemote};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Node name, also used as hostname and DNS label
    pub name: String,

    /// Operating system family, matched against image names
    #[arg(long)]
    pub os_type: String,

    #[arg(long)]
    pub os_version: String,

    /// Login user created on the node
    #[arg(long, default_value = "ubuntu")]
    pub user: String,

    /// Public key to install (default: ~/.ssh/id_rsa.pub or id_ed25519.pub)
    #[arg(long)]
    pub ssh_key: Option<PathBuf>,

    /// YAML file with machine/volumes settings
    #[arg(long)]
    pub conf: Option<PathBuf>,

    /// Minimum RAM in MB
    #[arg(long)]
    pub ram: Option<u64>,

    /// Minimum root disk in GB
    #[arg(long)]
    pub disk: Option<u64>,

    #[arg(long)]
    pub cpus: Option<u32>,

    /// Number of extra volumes
    #[arg(long)]
    pub volumes: Option<u32>,

    /// Size of each extra volume in GB
    #[arg(long)]
    pub volume_size: Option<u64>,
}

impl CreateArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            ram: self.ram,
            disk: self.disk,
            cpus: self.cpus,
            volumes: self.volumes,
            volume_size: self.volume_size,
        }
    }
}

pub async fn handle(
    global: &GlobalConfig,
    provider: Provider,
    args: &CreateArgs,
) -> anyhow::Result<()> {
    let request = ProvisioningRequest::new(&args.name, &args.os_type, &args.os_version)?
        .with_user(&args.user);

    let explicit = utils::explicit_config(args.conf.as_deref(), args.overrides())?;
    let conf = resolve(Some(&explicit), provider.name(), global, &default_sizing())
        .context("Failed to resolve configuration")?;

    let request = match utils::read_ssh_pubkey(args.ssh_key.as_deref())? {
        Some(key) => request.with_ssh_pubkey(key),
        None => request,
    };

    println!("{}", format!("Creating {}...", args.name).blue());
    println!(
        "  machine: {}MB RAM, {}GB disk, {} cpus",
        conf.machine.ram, conf.machine.disk, conf.machine.cpus
    );
    if conf.volumes.count > 0 {
        println!(
            "  volumes: {} x {}GB",
            conf.volumes.count, conf.volumes.size
        );
    }

    let remote = Arc::new(SshRemote::new(&args.user, &args.name));
    let mut provisioner = Provisioner::new(provider, request, conf, remote);
    if let Some(url) = global.nsupdate_url() {
        provisioner = provisioner.with_dns(Arc::new(NsUpdateClient::new(url)));
    }

    let node = provisioner
        .create()
        .await
        .with_context(|| format!("Failed to create {}", args.name))?;

    println!();
    println!("{}", format!("✓ {} is ready", node.name).green());
    println!("  id: {}", node.id.cyan());
    if !provisioner.ips().is_empty() {
        println!("  addresses: {}", provisioner.ips().join(", "));
    }
    Ok(())
}

mod commands;
mod session;
mod utils;

use anyhow::Context;
use clap::{Parser, Subcommand};
use commands::create::CreateArgs;
use session::Driver;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nodeflow")]
#[command(
    about = "Provision cloud test nodes: create, attach volumes, register DNS, wait for boot",
    long_about = None
)]
struct Cli {
    /// Compute backend
    #[arg(long, global = true, value_enum, default_value = "openstack", env = "NODEFLOW_DRIVER")]
    driver: Driver,

    /// clouds.yaml entry passed to the backend client
    #[arg(long, global = true, env = "OS_CLOUD")]
    os_cloud: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a node and wait until it is ready
    Create(CreateArgs),
    /// Destroy a node and its volumes
    Destroy {
        /// Node name
        name: String,
    },
    /// List images offered by the backend
    Images,
    /// List sizes (flavors) available for selection
    Sizes,
    /// List nodes
    Nodes,
    /// Show version information
    Version,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // version needs no configuration
    if matches!(cli.command, Commands::Version) {
        println!("nodeflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let global = nodeflow_config::GlobalConfig::discover().context("Failed to load configuration")?;
    if let Some(source) = global.source() {
        tracing::debug!("Using config file {}", source.display());
    }

    let provider = session::provider(&global, cli.driver, cli.os_cloud.as_deref())?;

    match cli.command {
        Commands::Create(args) => commands::create::handle(&global, provider, &args).await,
        Commands::Destroy { name } => commands::destroy::handle(provider, &name).await,
        Commands::Images => commands::catalog::images(&provider).await,
        Commands::Sizes => commands::catalog::sizes(&provider).await,
        Commands::Nodes => commands::catalog::nodes(&provider).await,
        Commands::Version => Ok(()),
    }
}

use colored::Colorize;
use nodeflow_cloud::{NodeState, Provider};

pub async fn images(provider: &Provider) -> anyhow::Result<()> {
    let images = provider.images().await?;
    if images.is_empty() {
        println!("{}", "No images".dimmed());
        return Ok(());
    }

    println!("{}", format!("{:<40} {}", "ID", "NAME").bold());
    println!("{}", "─".repeat(80).dimmed());
    for image in images {
        println!("{:<40} {}", image.id.dimmed(), image.name.cyan());
    }
    Ok(())
}

pub async fn sizes(provider: &Provider) -> anyhow::Result<()> {
    let mut sizes = provider.sizes().await?.to_vec();
    if sizes.is_empty() {
        println!("{}", "No sizes".dimmed());
        return Ok(());
    }
    sizes.sort_by_key(|s| s.cost_key());

    println!(
        "{}",
        format!("{:<24} {:>10} {:>10} {:>6}", "NAME", "RAM (MB)", "DISK (GB)", "VCPUS").bold()
    );
    println!("{}", "─".repeat(53).dimmed());
    for size in &sizes {
        println!(
            "{:<24} {:>10} {:>10} {:>6}",
            size.name.cyan(),
            size.ram,
            size.disk,
            size.vcpus
        );
    }
    Ok(())
}

pub async fn nodes(provider: &Provider) -> anyhow::Result<()> {
    let nodes = provider
        .call("list_nodes", || provider.driver().list_nodes())
        .await?;
    if nodes.is_empty() {
        println!("{}", "No nodes".dimmed());
        return Ok(());
    }

    println!("{}", format!("{:<24} {:<10} {}", "NAME", "STATE", "ADDRESSES").bold());
    println!("{}", "─".repeat(70).dimmed());
    for node in &nodes {
        let state = match node.state {
            NodeState::Running => node.state.to_string().green(),
            NodeState::Pending => node.state.to_string().yellow(),
            _ => node.state.to_string().red(),
        };
        println!(
            "{:<24} {:<10} {}",
            node.name.cyan(),
            state,
            node.ip_addresses().join(", ")
        );
    }
    Ok(())
}

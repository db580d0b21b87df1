//! Controller inspection commands

use anyhow::{Context, Result};
use can_lib::config::CanConfig;
use can_lib::controller::{FlowController, OnosClient};
use can_lib::error::QosError;
use colored::Colorize;
use tabled::Tabled;

use crate::output::{print_json, print_table, print_warning, OutputFormat};

/// Row for flow table
#[derive(Tabled)]
struct FlowRow {
    #[tabled(rename = "Source")]
    eth_src: String,
    #[tabled(rename = "Destination")]
    eth_dst: String,
    #[tabled(rename = "In")]
    in_port: String,
    #[tabled(rename = "Out")]
    out_port: String,
}

/// List forwarding flows installed on a device
pub async fn show_flows(config: &CanConfig, device: &str, format: OutputFormat) -> Result<()> {
    let client = OnosClient::new(&config.controller)?;
    let flows = client
        .flows_for_device(device)
        .await
        .with_context(|| format!("Failed to read flows of {}", device))?;

    match format {
        OutputFormat::Json => print_json(&flows)?,
        OutputFormat::Table => {
            println!("Device: {}", device.cyan());
            let rows: Vec<FlowRow> = flows
                .into_iter()
                .map(|f| FlowRow {
                    eth_src: f.eth_src,
                    eth_dst: f.eth_dst,
                    in_port: f.in_port,
                    out_port: f.out_port,
                })
                .collect();
            print_table(rows);
        }
    }
    Ok(())
}

/// List egress ports of the paths between two devices
pub async fn show_paths(
    config: &CanConfig,
    src: &str,
    dst: &str,
    format: OutputFormat,
) -> Result<()> {
    let client = OnosClient::new(&config.controller)?;
    let ports = match client.alternate_ports(src, dst).await {
        Ok(ports) => ports,
        Err(QosError::NoPathFound { .. }) => {
            print_warning(&format!("No path from {} to {}", src, dst));
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to read paths"),
    };

    match format {
        OutputFormat::Json => print_json(&ports)?,
        OutputFormat::Table => {
            println!("{} -> {}", src.cyan(), dst.cyan());
            println!("Egress ports: {}", ports.join(", ").bold());
        }
    }
    Ok(())
}

/// Show the switches a host is attached to
pub async fn show_hosts(config: &CanConfig, mac: &str, format: OutputFormat) -> Result<()> {
    let client = OnosClient::new(&config.controller)?;
    let switches = client
        .switches_for_host(mac)
        .await
        .with_context(|| format!("Failed to locate host {}", mac))?;

    match format {
        OutputFormat::Json => print_json(&switches)?,
        OutputFormat::Table => {
            if switches.is_empty() {
                print_warning(&format!("Host {} is not known to the controller", mac));
                return Ok(());
            }
            println!("Host {} attached to:", mac.cyan());
            for switch in &switches {
                println!("  {}", switch);
            }
        }
    }
    Ok(())
}

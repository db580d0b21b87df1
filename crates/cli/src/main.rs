//! CAN QoS CLI
//!
//! A command-line tool for inspecting link state, controller flows and
//! action spaces, and for driving single episodes of the control loop.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{controller, episode, telemetry};

/// CAN QoS CLI
#[derive(Parser)]
#[command(name = "canctl")]
#[command(author, version, about = "CLI for the CAN QoS control loop", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub connection: config::ConnectionArgs,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the utilization of every switch link
    States {
        /// Only show links above this utilization
        #[arg(long)]
        above: Option<f64>,
    },

    /// Show the current reward
    Reward,

    /// Dump one metric for every data source
    Dump {
        /// Metric name (e.g. ifinoctets)
        metric: String,
    },

    /// Poll link state at a fixed interval
    Watch {
        /// Number of polls before stopping (runs until Ctrl-C if omitted)
        #[arg(long)]
        ticks: Option<u64>,

        /// Delay between polls in milliseconds
        #[arg(long, default_value = "1000")]
        interval_ms: u64,
    },

    /// Register the per-flow definition with the metrics source
    RegisterFlow,

    /// List forwarding flows installed on a device
    Flows {
        /// Device id (e.g. of:0000000000000001)
        device: String,
    },

    /// List egress ports of the paths between two devices
    Paths {
        /// Source device id
        src: String,
        /// Destination device id
        dst: String,
    },

    /// Show the switches a host is attached to
    Hosts {
        /// Host MAC address
        mac: String,
    },

    /// Enumerate the actions that relieve a congested port
    Actions {
        /// Device id of the congested link
        device: String,
        /// Congested egress port
        port: String,
    },

    /// Install a rule moving a flow to another egress port
    Apply {
        /// Device id to install on
        #[arg(long)]
        device: String,

        /// Source MAC of the flow
        #[arg(long)]
        src: String,

        /// Destination MAC of the flow
        #[arg(long)]
        dst: String,

        /// Ingress port of the flow
        #[arg(long)]
        in_port: String,

        /// New egress port
        #[arg(long)]
        out_port: String,

        /// Print the rule without installing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Run one observe -> act -> reward episode with the greedy policy
    Episode {
        /// Utilization above which a link counts as congested
        #[arg(long)]
        threshold: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_writer(std::io::stderr)
            .init();
    }

    let config = cli.connection.load()?;

    match cli.command {
        Commands::States { above } => {
            telemetry::show_states(&config, above, cli.format).await?;
        }
        Commands::Reward => {
            telemetry::show_reward(&config, cli.format).await?;
        }
        Commands::Dump { metric } => {
            telemetry::dump_metric(&config, &metric, cli.format).await?;
        }
        Commands::Watch { ticks, interval_ms } => {
            telemetry::watch(&config, ticks, interval_ms, cli.format).await?;
        }
        Commands::RegisterFlow => {
            telemetry::register_flow(&config).await?;
        }
        Commands::Flows { device } => {
            controller::show_flows(&config, &device, cli.format).await?;
        }
        Commands::Paths { src, dst } => {
            controller::show_paths(&config, &src, &dst, cli.format).await?;
        }
        Commands::Hosts { mac } => {
            controller::show_hosts(&config, &mac, cli.format).await?;
        }
        Commands::Actions { device, port } => {
            episode::show_actions(&config, &device, &port, cli.format).await?;
        }
        Commands::Apply {
            device,
            src,
            dst,
            in_port,
            out_port,
            dry_run,
        } => {
            let action = can_lib::Action {
                eth_src: src,
                eth_dst: dst,
                in_port,
                candidate_out_port: out_port,
            };
            episode::apply_action(&config, &device, &action, dry_run, cli.format).await?;
        }
        Commands::Episode { threshold } => {
            episode::run_episode(&config, threshold, cli.format).await?;
        }
    }

    Ok(())
}

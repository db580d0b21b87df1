//! Action space, flow install and single-episode commands

use anyhow::{Context, Result};
use can_lib::actions::ActionSpaceGenerator;
use can_lib::config::CanConfig;
use can_lib::controller::{FlowTemplate, OnosClient};
use can_lib::environment::{Environment, EpisodeOutcome};
use can_lib::executor::ActionExecutor;
use can_lib::models::Action;
use can_lib::policy::GreedyPolicy;
use colored::Colorize;
use std::sync::Arc;
use tabled::Tabled;

use crate::output::{
    color_outcome, color_reward, print_info, print_json, print_success, print_table,
    print_warning, OutputFormat,
};

/// Row for action table
#[derive(Tabled)]
struct ActionRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Source")]
    eth_src: String,
    #[tabled(rename = "Destination")]
    eth_dst: String,
    #[tabled(rename = "In")]
    in_port: String,
    #[tabled(rename = "New Out")]
    out_port: String,
}

fn action_rows(actions: &[Action]) -> Vec<ActionRow> {
    actions
        .iter()
        .enumerate()
        .map(|(index, a)| ActionRow {
            index,
            eth_src: a.eth_src.clone(),
            eth_dst: a.eth_dst.clone(),
            in_port: a.in_port.clone(),
            out_port: a.candidate_out_port.clone(),
        })
        .collect()
}

fn template(config: &CanConfig) -> Result<FlowTemplate> {
    match &config.controller.flow_template_path {
        Some(path) => FlowTemplate::load(path)
            .with_context(|| format!("Failed to load flow template {}", path)),
        None => Ok(FlowTemplate::default()),
    }
}

/// Enumerate the actions that relieve a congested port
pub async fn show_actions(
    config: &CanConfig,
    device: &str,
    port: &str,
    format: OutputFormat,
) -> Result<()> {
    let controller = Arc::new(OnosClient::new(&config.controller)?);
    let space = ActionSpaceGenerator::new(controller)
        .generate(device, port)
        .await
        .with_context(|| format!("Failed to enumerate actions for {}/{}", device, port))?;

    match format {
        OutputFormat::Json => print_json(&space)?,
        OutputFormat::Table => {
            println!("{}", "Action Space".bold());
            println!("{}", "=".repeat(50));
            println!("Link:       {}/{}", device.cyan(), port.cyan());
            println!("Candidates: {}", space.candidates.len());
            println!("Outcome:    {}", color_outcome(space.outcome.as_str()));
            println!();
            print_table(action_rows(&space.actions));
        }
    }
    Ok(())
}

/// Install a rule moving a flow to another egress port
pub async fn apply_action(
    config: &CanConfig,
    device: &str,
    action: &Action,
    dry_run: bool,
    format: OutputFormat,
) -> Result<()> {
    let template = template(config)?;

    if dry_run {
        let rule = template.render(action, device);
        match format {
            OutputFormat::Json => print_json(&rule)?,
            OutputFormat::Table => {
                print_info("Dry run: rule not installed");
                println!("{}", serde_json::to_string_pretty(&rule)?);
            }
        }
        return Ok(());
    }

    let controller = Arc::new(OnosClient::new(&config.controller)?);
    ActionExecutor::new(controller, template)
        .apply(action, device)
        .await
        .with_context(|| format!("Failed to install rule on {}", device))?;

    print_success(&format!("Installed {} on {}", action, device));
    Ok(())
}

/// Run one episode with the greedy policy
pub async fn run_episode(
    config: &CanConfig,
    threshold: Option<f64>,
    format: OutputFormat,
) -> Result<()> {
    let threshold = threshold.unwrap_or(config.environment.congestion_threshold);
    let environment = Environment::from_config(config)?.with_instance("canctl");

    let outcome = environment
        .step(&GreedyPolicy::new(threshold))
        .await
        .context("Episode aborted")?;

    if let OutputFormat::Json = format {
        return print_json(&outcome);
    }

    match outcome {
        EpisodeOutcome::Completed(episode) => {
            let before = can_lib::reward::reward(&episode.state_before);
            println!("{}", "Episode".bold());
            println!("{}", "=".repeat(50));
            println!("Device:        {}", episode.device_id.cyan());
            println!("Action:        {}", episode.action);
            println!("Reward before: {}", color_reward(before));
            println!("Reward after:  {}", color_reward(episode.reward));
            print_success("Action applied");
        }
        EpisodeOutcome::NoTarget => {
            print_info(&format!("No link above {:.0}% utilization", threshold * 100.0));
        }
        EpisodeOutcome::NoCandidates { device_id, port } => {
            print_warning(&format!("No forwarding flow uses {}/{}", device_id, port));
        }
        EpisodeOutcome::NoAlternatives { device_id, port } => {
            print_warning(&format!(
                "Flows on {}/{} have no alternate egress",
                device_id, port
            ));
        }
        EpisodeOutcome::Declined { device_id, port } => {
            print_warning(&format!("Policy declined every action for {}/{}", device_id, port));
        }
    }
    Ok(())
}

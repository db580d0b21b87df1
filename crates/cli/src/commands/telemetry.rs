//! Link state and metrics source commands

use anyhow::{Context, Result};
use can_lib::config::CanConfig;
use can_lib::models::LinkState;
use can_lib::reward::reward;
use can_lib::state::{StateBuilder, StateMap};
use can_lib::telemetry::{FlowDefinition, Poller, PollerConfig, SflowClient, TelemetrySource};
use colored::Colorize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tabled::Tabled;
use tokio::sync::watch;

use crate::output::{
    color_reward, color_utilization, print_info, print_json, print_success, print_table,
    print_warning, OutputFormat,
};

/// Row for link state table
#[derive(Tabled)]
struct LinkRow {
    #[tabled(rename = "Device")]
    device_id: String,
    #[tabled(rename = "Port")]
    port: String,
    #[tabled(rename = "Utilization")]
    utilization: String,
}

/// Row for metric dump table
#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Data Source")]
    data_source: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn link_rows<'a>(links: impl IntoIterator<Item = &'a LinkState>, threshold: f64) -> Vec<LinkRow> {
    links
        .into_iter()
        .map(|s| LinkRow {
            device_id: s.device_id.clone(),
            port: s.port.clone(),
            utilization: color_utilization(s.utilization, threshold),
        })
        .collect()
}

async fn observe(config: &CanConfig) -> Result<StateMap> {
    let client = SflowClient::new(&config.telemetry)?;
    let samples = client
        .sample(&config.telemetry.metric_names())
        .await
        .context("Failed to sample interface table")?;
    Ok(StateBuilder::from_config(&config.telemetry).build(&samples))
}

/// Show the utilization of every switch link
pub async fn show_states(
    config: &CanConfig,
    above: Option<f64>,
    format: OutputFormat,
) -> Result<()> {
    let states = observe(config).await?;
    let links: Vec<&LinkState> = states
        .values()
        .filter(|s| above.map_or(true, |min| s.utilization > min))
        .collect();

    match format {
        OutputFormat::Json => print_json(&links)?,
        OutputFormat::Table => {
            println!("{}", "Link State".bold());
            println!("{}", "=".repeat(50));
            let threshold = config.environment.congestion_threshold;
            print_table(link_rows(links.iter().copied(), threshold));
            println!(
                "\nTotal: {} links, reward {}",
                links.len(),
                color_reward(reward(states.values()))
            );
        }
    }
    Ok(())
}

/// Show the current reward
pub async fn show_reward(config: &CanConfig, format: OutputFormat) -> Result<()> {
    let states = observe(config).await?;
    let value = reward(states.values());

    match format {
        OutputFormat::Json => print_json(&json!({ "links": states.len(), "reward": value }))?,
        OutputFormat::Table => {
            println!("Links:  {}", states.len());
            println!("Reward: {}", color_reward(value));
        }
    }
    Ok(())
}

/// Dump one metric for every data source
pub async fn dump_metric(config: &CanConfig, metric: &str, format: OutputFormat) -> Result<()> {
    let client = SflowClient::new(&config.telemetry)?;
    let values = client
        .dump(metric)
        .await
        .with_context(|| format!("Failed to dump metric {}", metric))?;

    match format {
        OutputFormat::Json => print_json(&values)?,
        OutputFormat::Table => {
            let rows: Vec<MetricRow> = values
                .iter()
                .map(|(source, value)| MetricRow {
                    data_source: source.clone(),
                    value: value.as_text(),
                })
                .collect();
            print_table(rows);
        }
    }
    Ok(())
}

/// Poll link state at a fixed interval until `ticks` or Ctrl-C
pub async fn watch(
    config: &CanConfig,
    ticks: Option<u64>,
    interval_ms: u64,
    format: OutputFormat,
) -> Result<()> {
    let source: Arc<dyn TelemetrySource> = Arc::new(SflowClient::new(&config.telemetry)?);
    let builder = StateBuilder::from_config(&config.telemetry);
    let threshold = config.environment.congestion_threshold;

    let (poller, mut batches) = Poller::new(
        source,
        config.telemetry.metric_names(),
        PollerConfig {
            interval: Duration::from_millis(interval_ms),
            max_ticks: ticks,
            ..Default::default()
        },
    );

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let handle = tokio::spawn(poller.run(cancel_rx));

    loop {
        tokio::select! {
            batch = batches.recv() => {
                let Some(samples) = batch else { break };
                let states = builder.build(&samples);
                let value = reward(states.values());
                match format {
                    OutputFormat::Json => {
                        let links: Vec<&LinkState> = states.values().collect();
                        println!("{}", json!({ "reward": value, "links": links }));
                    }
                    OutputFormat::Table => {
                        let value = color_reward(value);
                        print_info(&format!("{} links, reward {}", states.len(), value));
                        print_table(link_rows(states.values(), threshold));
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                let _ = cancel_tx.send(true);
            }
        }
    }

    let summary = handle.await?;
    if summary.failures > 0 {
        print_warning(&format!(
            "{} of {} polls failed",
            summary.failures, summary.ticks
        ));
    }
    Ok(())
}

/// Register the per-flow definition with the metrics source
pub async fn register_flow(config: &CanConfig) -> Result<()> {
    let client = SflowClient::new(&config.telemetry)?;
    let definition = FlowDefinition {
        keys: config.telemetry.flow_keys.clone(),
        value: config.telemetry.flow_value.clone(),
    };

    let created = client
        .register_flow_definition(&config.telemetry.flow_name, &definition)
        .await
        .context("Failed to register flow definition")?;

    if created {
        print_success(&format!("Registered flow '{}'", config.telemetry.flow_name));
    } else {
        print_info(&format!(
            "Flow '{}' already registered",
            config.telemetry.flow_name
        ));
    }
    Ok(())
}

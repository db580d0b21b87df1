//! CAN QoS agent
//!
//! Observes link utilization through the sFlow collector, publishes it for
//! scraping and, in greedy mode, relieves congested links by rewriting flows
//! through the ONOS controller.

use anyhow::Result;
use can_lib::{
    environment::Environment,
    health::{components, HealthRegistry},
    observability::{QosMetrics, StructuredLogger},
    telemetry::{FlowDefinition, SflowClient},
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod control_loop;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting can-agent");

    let config = config::AgentConfig::load()?;
    info!(instance = %config.instance, mode = ?config.mode, "Agent configured");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::TELEMETRY).await;
    health_registry.register(components::CONTROLLER).await;
    health_registry.register(components::ENVIRONMENT).await;

    // Register metrics before the first scrape
    let _metrics = QosMetrics::new();

    let logger = StructuredLogger::new(&config.instance);
    logger.log_startup(
        AGENT_VERSION,
        &config.telemetry.endpoint,
        &config.controller.endpoint,
    );

    if config.register_flow {
        let sflow = SflowClient::new(&config.telemetry)?;
        let definition = FlowDefinition {
            keys: config.telemetry.flow_keys.clone(),
            value: config.telemetry.flow_value.clone(),
        };
        if let Err(e) = sflow
            .register_flow_definition(&config.telemetry.flow_name, &definition)
            .await
        {
            warn!(error = %e, "Flow definition not registered, continuing");
        }
    }

    let environment = Arc::new(
        Environment::from_config(&config.can_config())?
            .with_health(health_registry.clone())
            .with_instance(&config.instance),
    );

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        environment.clone(),
    ));

    health_registry.set_ready(true).await;

    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let loop_handle = tokio::spawn(control_loop::run(
        environment,
        config.mode,
        config.environment.poll_interval(),
        shutdown_rx,
    ));

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    health_registry.set_ready(false).await;

    // An in-flight episode finishes before the loop observes shutdown
    let _ = shutdown_tx.send(true);
    let summary = loop_handle.await?;
    api_handle.abort();

    info!(
        iterations = summary.iterations,
        actions_applied = summary.actions_applied,
        "Shut down"
    );
    Ok(())
}

//! Agent configuration

use anyhow::{Context, Result};
use can_lib::config::{CanConfig, ControllerConfig, EnvironmentConfig, TelemetryConfig};
use serde::Deserialize;

/// What the control loop does on each tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    /// Publish observations only
    #[default]
    Observe,
    /// Run full episodes with the greedy policy
    Greedy,
}

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Instance name attached to log events
    #[serde(default = "default_instance")]
    pub instance: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default)]
    pub mode: LoopMode,

    /// Register the per-flow definition with the metrics source at startup
    #[serde(default = "default_register_flow")]
    pub register_flow: bool,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub controller: ControllerConfig,

    #[serde(default)]
    pub environment: EnvironmentConfig,
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "can-agent".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_register_flow() -> bool {
    true
}

impl AgentConfig {
    /// Load configuration from the optional `CAN_CONFIG` file, then `CAN_*`
    /// environment variables
    pub fn load() -> Result<Self> {
        let file = std::env::var("CAN_CONFIG").ok();
        let mut builder = config::Config::builder();
        if let Some(path) = &file {
            builder = builder.add_source(config::File::with_name(path));
        }

        Self::from_builder(builder).with_context(|| match &file {
            Some(path) => format!("Failed to load configuration from {}", path),
            None => "Failed to load configuration from environment".to_string(),
        })
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let config = builder
            .add_source(
                config::Environment::with_prefix("CAN")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Library configuration for the environment facade
    pub fn can_config(&self) -> CanConfig {
        CanConfig {
            telemetry: self.telemetry.clone(),
            controller: self.controller.clone(),
            environment: self.environment.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    fn from_toml(toml: &str) -> AgentConfig {
        let builder = config::Config::builder().add_source(File::from_str(toml, FileFormat::Toml));
        AgentConfig::from_builder(builder).unwrap()
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = from_toml("");

        assert_eq!(config.api_port, 8080);
        assert_eq!(config.mode, LoopMode::Observe);
        assert!(config.register_flow);
        assert_eq!(config.telemetry.endpoint, "http://127.0.0.1:8008");
        assert_eq!(config.controller.username, "onos");
        assert_eq!(config.environment.read_retries, 3);
    }

    #[test]
    fn test_partial_sections_keep_remaining_defaults() {
        let config = from_toml(
            r#"
            api_port = 9100
            mode = "greedy"

            [telemetry]
            endpoint = "http://sflow:8008"
            link_capacity_bps = 100000000.0

            [environment]
            congestion_threshold = 0.7
            "#,
        );

        assert_eq!(config.api_port, 9100);
        assert_eq!(config.mode, LoopMode::Greedy);
        assert_eq!(config.telemetry.endpoint, "http://sflow:8008");
        assert_eq!(config.telemetry.agent, "TOPOLOGY");
        assert_eq!(config.environment.congestion_threshold, 0.7);
        assert_eq!(config.environment.read_retries, 3);

        let can = config.can_config();
        assert_eq!(can.telemetry.link_capacity_bps, 1e8);
        assert_eq!(can.controller.app_id, "99");
    }
}

//! Connection settings for the CLI

use anyhow::{Context, Result};
use can_lib::config::CanConfig;
use clap::Args;
use std::path::PathBuf;

/// Endpoints and credentials, layered over an optional JSON config file
#[derive(Debug, Clone, Args)]
pub struct ConnectionArgs {
    /// Path to a JSON configuration file
    #[arg(long, env = "CAN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// sFlow-RT base URL
    #[arg(long, env = "CAN_TELEMETRY_URL", global = true)]
    pub telemetry_url: Option<String>,

    /// ONOS base URL
    #[arg(long, env = "CAN_CONTROLLER_URL", global = true)]
    pub controller_url: Option<String>,

    /// ONOS user
    #[arg(long, env = "CAN_CONTROLLER_USER", global = true)]
    pub controller_user: Option<String>,

    /// ONOS password
    #[arg(long, env = "CAN_CONTROLLER_PASSWORD", hide_env_values = true, global = true)]
    pub controller_password: Option<String>,

    /// Link capacity in bits per second
    #[arg(long, env = "CAN_LINK_CAPACITY", global = true)]
    pub link_capacity: Option<f64>,
}

impl ConnectionArgs {
    /// Load the file (if any) and apply flag overrides
    pub fn load(&self) -> Result<CanConfig> {
        let base = match &self.config {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                serde_json::from_str(&content).context("Failed to parse config file")?
            }
            None => CanConfig::default(),
        };

        Ok(self.apply(base))
    }

    fn apply(&self, mut config: CanConfig) -> CanConfig {
        if let Some(url) = &self.telemetry_url {
            config.telemetry.endpoint = url.clone();
        }
        if let Some(url) = &self.controller_url {
            config.controller.endpoint = url.clone();
        }
        if let Some(user) = &self.controller_user {
            config.controller.username = user.clone();
        }
        if let Some(password) = &self.controller_password {
            config.controller.password = password.clone();
        }
        if let Some(capacity) = self.link_capacity {
            config.telemetry.link_capacity_bps = capacity;
        }
        config
    }
}

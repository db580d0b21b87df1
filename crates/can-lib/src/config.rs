//! Configuration for the telemetry client, the controller client and the
//! environment facade
//!
//! Every field has a default so a partial file or a handful of environment
//! variables is enough to run against a local emulated network.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration passed into each component constructor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanConfig {
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
}

/// Metrics source connection and state normalization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Base URL of the metrics source
    #[serde(default = "default_telemetry_endpoint")]
    pub endpoint: String,

    /// Agent name used in table and dump queries
    #[serde(default = "default_telemetry_agent")]
    pub agent: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Substring that marks a switch-facing interface name
    #[serde(default = "default_switch_interface_marker")]
    pub switch_interface_marker: String,

    /// Link capacity in bits per second
    #[serde(default = "default_link_capacity_bps")]
    pub link_capacity_bps: f64,

    /// Metric that carries the per-interface byte count
    #[serde(default = "default_byte_metric")]
    pub byte_metric: String,

    /// Name of the flow definition registered at startup
    #[serde(default = "default_flow_name")]
    pub flow_name: String,

    /// Keys of the registered flow definition
    #[serde(default = "default_flow_keys")]
    pub flow_keys: String,

    /// Value of the registered flow definition
    #[serde(default = "default_flow_value")]
    pub flow_value: String,
}

impl TelemetryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Metric names requested on every poll
    pub fn metric_names(&self) -> Vec<String> {
        vec![
            "ifname".to_string(),
            self.byte_metric.clone(),
            "of_dpid".to_string(),
            "of_port".to_string(),
        ]
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: default_telemetry_endpoint(),
            agent: default_telemetry_agent(),
            request_timeout_ms: default_request_timeout_ms(),
            switch_interface_marker: default_switch_interface_marker(),
            link_capacity_bps: default_link_capacity_bps(),
            byte_metric: default_byte_metric(),
            flow_name: default_flow_name(),
            flow_keys: default_flow_keys(),
            flow_value: default_flow_value(),
        }
    }
}

/// SDN controller connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Base URL of the controller REST API
    #[serde(default = "default_controller_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default = "default_password")]
    pub password: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Application id under which rewritten flows are installed
    #[serde(default = "default_app_id")]
    pub app_id: String,

    /// Application whose flows are candidates for rewriting
    #[serde(default = "default_forwarding_app")]
    pub forwarding_app: String,

    /// Optional path to a flow template overriding the embedded one
    #[serde(default)]
    pub flow_template_path: Option<String>,
}

impl ControllerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_controller_endpoint(),
            username: default_username(),
            password: default_password(),
            request_timeout_ms: default_request_timeout_ms(),
            app_id: default_app_id(),
            forwarding_app: default_forwarding_app(),
            flow_template_path: None,
        }
    }
}

/// Episode sequencing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Retries after the first failed read before the episode aborts
    #[serde(default = "default_read_retries")]
    pub read_retries: u32,

    /// Fixed delay between read retries in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Utilization above which a link counts as congested
    #[serde(default = "default_congestion_threshold")]
    pub congestion_threshold: f64,

    /// Delay between observations in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl EnvironmentConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            read_retries: default_read_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            congestion_threshold: default_congestion_threshold(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_telemetry_endpoint() -> String {
    "http://127.0.0.1:8008".to_string()
}

fn default_telemetry_agent() -> String {
    "TOPOLOGY".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_switch_interface_marker() -> String {
    "-eth".to_string()
}

fn default_link_capacity_bps() -> f64 {
    10.0 * 1_000_000.0
}

fn default_byte_metric() -> String {
    "ifinoctets".to_string()
}

fn default_flow_name() -> String {
    "can-qos".to_string()
}

fn default_flow_keys() -> String {
    "ipsource,ipdestination".to_string()
}

fn default_flow_value() -> String {
    "bytes".to_string()
}

fn default_controller_endpoint() -> String {
    "http://127.0.0.1:8181".to_string()
}

fn default_username() -> String {
    "onos".to_string()
}

fn default_password() -> String {
    "rocks".to_string()
}

fn default_app_id() -> String {
    "99".to_string()
}

fn default_forwarding_app() -> String {
    "org.onosproject.fwd".to_string()
}

fn default_read_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_congestion_threshold() -> f64 {
    0.8
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

//! SDN controller access
//!
//! This module provides:
//! - Typed records for the controller's flow, path and host documents
//! - A REST client with basic-auth and per-request timeouts
//! - The flow template used to install rewritten rules

mod client;
mod template;


pub use client::OnosClient;
pub use template::{FlowTemplate, DEFAULT_FLOW_TEMPLATE};

use crate::error::Result;
use crate::models::FlowRecord;
use async_trait::async_trait;

/// Operations the control loop needs from the controller
#[async_trait]
pub trait FlowController: Send + Sync {
    /// Rules on `device_id` installed by the default forwarding application
    async fn flows_for_device(&self, device_id: &str) -> Result<Vec<FlowRecord>>;

    /// First-hop egress ports of every path from `src_device_id` to
    /// `dst_device_id`, deduplicated and in ascending port order
    ///
    /// Fails with `NoPathFound` when the controller reports no path.
    async fn alternate_ports(&self, src_device_id: &str, dst_device_id: &str)
        -> Result<Vec<String>>;

    /// Devices the host with this MAC attaches to, deduplicated and sorted
    async fn switches_for_host(&self, host_mac: &str) -> Result<Vec<String>>;

    /// Submit a rendered flow rule for `device_id`
    async fn install_flow(&self, device_id: &str, rule: &serde_json::Value) -> Result<()>;
}

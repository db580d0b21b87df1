//! Interface telemetry from the metrics source
//!
//! This module provides the client that reads per-interface byte counters
//! and their SDN identifiers, and a bounded polling primitive on top of it.

mod client;
mod poller;

#[cfg(test)]
mod tests;

pub use client::{parse_table, FlowDefinition, MetricValue, SflowClient};
pub use poller::{PollSummary, Poller, PollerConfig};

use crate::error::Result;
use crate::models::InterfaceSample;
use async_trait::async_trait;

/// Source of per-interface samples
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Read one row per interface for the given metric names
    async fn sample(&self, metric_names: &[String]) -> Result<Vec<InterfaceSample>>;
}

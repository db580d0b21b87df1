//! Congestion-aware QoS control loop for SDN fabrics
//!
//! This crate provides the core functionality for:
//! - Link telemetry from an sFlow collector
//! - Normalized link state and reward
//! - Flow inspection and action generation against an ONOS controller
//! - Episode sequencing for learning agents
//! - Health checks and observability

pub mod actions;
pub mod config;
pub mod controller;
pub mod environment;
pub mod error;
pub mod executor;
pub mod health;
pub mod models;
pub mod observability;
pub mod policy;
pub mod reward;
pub mod state;
pub mod telemetry;

#[cfg(test)]
mod test_support;

pub use actions::{ActionSpace, ActionSpaceGenerator, ActionSpaceOutcome};
pub use config::{CanConfig, ControllerConfig, EnvironmentConfig, TelemetryConfig};
pub use controller::{FlowController, FlowTemplate, OnosClient};
pub use environment::{Environment, EpisodeOutcome, EpisodePhase, StateSnapshot};
pub use error::{QosError, Result};
pub use executor::ActionExecutor;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{QosMetrics, StructuredLogger};
pub use policy::{GreedyPolicy, Policy};
pub use reward::reward;
pub use state::{StateBuilder, StateMap};
pub use telemetry::{SflowClient, TelemetrySource};

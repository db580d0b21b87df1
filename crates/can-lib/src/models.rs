//! Core data models for the QoS control loop

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// One interface row reported by the telemetry source at a poll tick
///
/// Fields the source did not report stay `None`; callers must treat them as
/// unavailable rather than zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceSample {
    pub interface_name: Option<String>,
    pub byte_count: Option<f64>,
    pub device_id: Option<String>,
    pub port: Option<String>,
}

/// Key of an observed link: the switch and its egress port
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkKey {
    pub device_id: String,
    pub port: String,
}

impl LinkKey {
    pub fn new(device_id: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device_id, self.port)
    }
}

impl Ord for LinkKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.device_id
            .cmp(&other.device_id)
            .then_with(|| compare_ports(&self.port, &other.port))
    }
}

impl PartialOrd for LinkKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Normalized utilization of one switch port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkState {
    pub device_id: String,
    pub port: String,
    /// Utilization in [0, 1]
    pub utilization: f64,
}

impl LinkState {
    pub fn key(&self) -> LinkKey {
        LinkKey::new(&self.device_id, &self.port)
    }
}

/// A forwarding rule installed by the default forwarding application
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowRecord {
    pub eth_src: String,
    pub eth_dst: String,
    pub in_port: String,
    pub out_port: String,
}

/// A candidate rewrite of an existing flow's egress port
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    pub eth_src: String,
    pub eth_dst: String,
    pub in_port: String,
    pub candidate_out_port: String,
}

impl Action {
    /// Pair a flow with an alternate egress port
    pub fn rewrite(flow: &FlowRecord, candidate_out_port: impl Into<String>) -> Self {
        Self {
            eth_src: flow.eth_src.clone(),
            eth_dst: flow.eth_dst.clone(),
            in_port: flow.in_port.clone(),
            candidate_out_port: candidate_out_port.into(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} (in {}, out {})",
            self.eth_src, self.eth_dst, self.in_port, self.candidate_out_port
        )
    }
}

/// One state -> action -> state' transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub device_id: String,
    pub state_before: Vec<LinkState>,
    pub action: Action,
    pub state_after: Vec<LinkState>,
    pub reward: f64,
}

/// Order two port identifiers: numerically when both are integers,
/// lexicographically otherwise. Numeric ports sort before named ones.
///
/// Returns `Equal` only for identical strings, so `"2"` and `"02"` stay
/// distinct keys.
pub fn compare_ports(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

//! Action space generation for a congested port
//!
//! Given a congested (device, port), every forwarding flow that currently
//! leaves through that port is paired with every other egress port on the
//! device that still reaches the flow's destination switch.

use crate::controller::FlowController;
use crate::error::{QosError, Result};
use crate::models::{compare_ports, Action, FlowRecord};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Why an action list has the size it has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSpaceOutcome {
    /// No forwarding flow uses the congested port
    NoCandidates,
    /// Flows use the port but no other egress reaches their destinations
    NoAlternatives,
    /// At least one action exists
    Available,
}

impl ActionSpaceOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionSpaceOutcome::NoCandidates => "no_candidates",
            ActionSpaceOutcome::NoAlternatives => "no_alternatives",
            ActionSpaceOutcome::Available => "available",
        }
    }
}

/// Candidate actions for one congested port
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpace {
    pub device_id: String,
    pub congested_port: String,
    /// Flows currently leaving through the congested port
    pub candidates: Vec<FlowRecord>,
    pub actions: Vec<Action>,
    pub outcome: ActionSpaceOutcome,
}

/// Enumerates legal egress rewrites using the controller's view
pub struct ActionSpaceGenerator {
    controller: Arc<dyn FlowController>,
}

impl ActionSpaceGenerator {
    pub fn new(controller: Arc<dyn FlowController>) -> Self {
        Self { controller }
    }

    /// Build the action space for `congested_port` on `device_id`
    ///
    /// Controller failures abort generation; a missing path only means that
    /// attach switch contributes no alternatives.
    pub async fn generate(&self, device_id: &str, congested_port: &str) -> Result<ActionSpace> {
        let candidates = candidate_flows(
            self.controller.flows_for_device(device_id).await?,
            congested_port,
        );

        let destinations: BTreeSet<&str> =
            candidates.iter().map(|c| c.eth_dst.as_str()).collect();
        let mut alternates_by_dst: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut ports_by_switch: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for eth_dst in destinations {
            let attach_switches = self.controller.switches_for_host(eth_dst).await?;

            let pending: Vec<String> = attach_switches
                .iter()
                .filter(|s| s.as_str() != device_id && !ports_by_switch.contains_key(*s))
                .cloned()
                .collect();
            let lookups = pending
                .iter()
                .map(|switch| self.alternate_ports(device_id, switch));
            for (switch, ports) in pending.iter().zip(join_all(lookups).await) {
                ports_by_switch.insert(switch.clone(), ports?);
            }

            // Union over every attach point of a multi-homed host
            let mut union: Vec<String> = attach_switches
                .iter()
                .filter_map(|s| ports_by_switch.get(s))
                .flatten()
                .cloned()
                .collect();
            union.sort_by(|a, b| compare_ports(a, b));
            union.dedup();

            debug!(
                device_id = %device_id,
                eth_dst = %eth_dst,
                attach_switches = attach_switches.len(),
                alternates = union.len(),
                "Resolved alternate ports"
            );
            alternates_by_dst.insert(eth_dst.to_string(), union);
        }

        let actions = build_actions(&candidates, congested_port, |flow| {
            alternates_by_dst
                .get(&flow.eth_dst)
                .map(Vec::as_slice)
                .unwrap_or_default()
        });

        let outcome = if candidates.is_empty() {
            ActionSpaceOutcome::NoCandidates
        } else if actions.is_empty() {
            ActionSpaceOutcome::NoAlternatives
        } else {
            ActionSpaceOutcome::Available
        };

        info!(
            event = "actions_enumerated",
            device_id = %device_id,
            congested_port = %congested_port,
            candidates = candidates.len(),
            actions = actions.len(),
            outcome = outcome.as_str(),
            "Enumerated action space"
        );

        Ok(ActionSpace {
            device_id: device_id.to_string(),
            congested_port: congested_port.to_string(),
            candidates,
            actions,
            outcome,
        })
    }

    /// Alternate ports toward one switch; no path yields none
    async fn alternate_ports(&self, device_id: &str, switch: &str) -> Result<Vec<String>> {
        match self.controller.alternate_ports(device_id, switch).await {
            Err(QosError::NoPathFound { .. }) => {
                debug!(device_id = %device_id, dst = %switch, "No path to attach switch");
                Ok(Vec::new())
            }
            other => other,
        }
    }
}

/// Deduplicated flows whose egress is `congested_port`, in a stable order
pub fn candidate_flows(flows: Vec<FlowRecord>, congested_port: &str) -> Vec<FlowRecord> {
    let mut seen = HashSet::new();
    let mut candidates: Vec<FlowRecord> = flows
        .into_iter()
        .filter(|f| f.out_port == congested_port)
        .filter(|f| seen.insert(f.clone()))
        .collect();
    candidates.sort_by(|a, b| {
        (a.eth_src.as_str(), a.eth_dst.as_str())
            .cmp(&(b.eth_src.as_str(), b.eth_dst.as_str()))
            .then_with(|| compare_ports(&a.in_port, &b.in_port))
    });
    candidates
}

/// Cross product of candidates and their alternate ports, never offering a
/// flow's current egress or the congested port
pub fn build_actions<'a, F>(
    candidates: &[FlowRecord],
    congested_port: &str,
    alternates_for: F,
) -> Vec<Action>
where
    F: Fn(&FlowRecord) -> &'a [String],
{
    let mut seen = HashSet::new();
    let mut actions = Vec::new();

    for flow in candidates {
        for port in alternates_for(flow) {
            if port == congested_port || *port == flow.out_port {
                continue;
            }
            let action = Action::rewrite(flow, port.as_str());
            if seen.insert(action.clone()) {
                actions.push(action);
            }
        }
    }

    actions
}

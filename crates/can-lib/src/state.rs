//! Conversion of raw interface samples into link utilization states

use crate::config::TelemetryConfig;
use crate::models::{InterfaceSample, LinkKey, LinkState};
use std::collections::BTreeMap;
use tracing::debug;

/// Prefix the controller puts in front of a bare datapath id
const OPENFLOW_PREFIX: &str = "of:";

/// Observed states keyed by (device, port)
pub type StateMap = BTreeMap<LinkKey, LinkState>;

/// Builds normalized utilization states from telemetry samples
#[derive(Debug, Clone)]
pub struct StateBuilder {
    link_capacity_bps: f64,
    switch_interface_marker: String,
}

impl StateBuilder {
    pub fn new(link_capacity_bps: f64, switch_interface_marker: impl Into<String>) -> Self {
        Self {
            link_capacity_bps,
            switch_interface_marker: switch_interface_marker.into(),
        }
    }

    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self::new(config.link_capacity_bps, &config.switch_interface_marker)
    }

    /// Map samples to states
    ///
    /// Only switch-facing interfaces with a byte count, a device id and a
    /// port are kept. The counter is taken as already rate-normalized by the
    /// source. When a key repeats, the later sample wins.
    pub fn build(&self, samples: &[InterfaceSample]) -> StateMap {
        let mut states = StateMap::new();
        let mut skipped = 0usize;

        for sample in samples {
            let Some(name) = sample.interface_name.as_deref() else {
                skipped += 1;
                continue;
            };
            if !is_switch_interface(name, &self.switch_interface_marker) {
                continue;
            }
            let (Some(bytes), Some(device), Some(port)) = (
                sample.byte_count,
                sample.device_id.as_deref().filter(|d| !d.is_empty()),
                sample.port.as_deref().filter(|p| !p.is_empty()),
            ) else {
                skipped += 1;
                continue;
            };

            let key = LinkKey::new(normalize_device_id(device), port);
            let state = LinkState {
                device_id: key.device_id.clone(),
                port: key.port.clone(),
                utilization: self.utilization(bytes),
            };
            states.insert(key, state);
        }

        if skipped > 0 {
            debug!(skipped, "Skipped samples with unavailable fields");
        }
        states
    }

    /// Bits-per-second ratio against link capacity, clamped into [0, 1]
    pub fn utilization(&self, bytes: f64) -> f64 {
        if self.link_capacity_bps <= 0.0 {
            return 0.0;
        }
        let ratio = (bytes * 8.0) / self.link_capacity_bps;
        if ratio.is_finite() {
            ratio.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// True for names like `s1-eth2`: a switch name, the marker, and a port number
pub fn is_switch_interface(name: &str, marker: &str) -> bool {
    if marker.is_empty() {
        return false;
    }
    let Some((switch, port)) = name.split_once(marker) else {
        return false;
    };
    !switch.is_empty()
        && !port.is_empty()
        && port.chars().all(|c| c.is_ascii_digit())
}

/// Controller form of a device id (`of:` followed by the datapath id)
pub fn normalize_device_id(device_id: &str) -> String {
    if device_id.starts_with(OPENFLOW_PREFIX) {
        device_id.to_string()
    } else {
        format!("{}{}", OPENFLOW_PREFIX, device_id)
    }
}

/// States above `threshold`, most utilized first
pub fn congested<'a>(
    states: impl IntoIterator<Item = &'a LinkState>,
    threshold: f64,
) -> Vec<LinkState> {
    let mut hot: Vec<LinkState> = states
        .into_iter()
        .filter(|s| s.utilization > threshold)
        .cloned()
        .collect();
    hot.sort_by(|a, b| {
        b.utilization
            .total_cmp(&a.utilization)
            .then_with(|| a.key().cmp(&b.key()))
    });
    hot
}

//! In-memory collaborators shared by unit tests

use crate::controller::FlowController;
use crate::error::{QosError, Result};
use crate::models::{FlowRecord, InterfaceSample};
use crate::telemetry::TelemetrySource;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const DEVICE: &str = "of:0000000000000001";

pub fn flow(src: &str, dst: &str, in_port: &str, out_port: &str) -> FlowRecord {
    FlowRecord {
        eth_src: src.to_string(),
        eth_dst: dst.to_string(),
        in_port: in_port.to_string(),
        out_port: out_port.to_string(),
    }
}

pub fn ports(list: &[&str]) -> Vec<String> {
    list.iter().map(|p| p.to_string()).collect()
}

/// Sample for switch 1 in the source's bare-dpid form
pub fn sample(ifname: &str, bytes: f64, port: &str) -> InterfaceSample {
    InterfaceSample {
        interface_name: Some(ifname.to_string()),
        byte_count: Some(bytes),
        device_id: Some("0000000000000001".to_string()),
        port: Some(port.to_string()),
    }
}

/// Controller with per-switch paths and host locations
#[derive(Default)]
pub struct FakeController {
    pub flows: Vec<FlowRecord>,
    pub hosts: HashMap<String, Vec<String>>,
    pub paths: HashMap<String, Vec<String>>,
    pub fail_flows: bool,
    pub fail_paths: bool,
    pub reject_install: Option<u16>,
    pub install_attempts: AtomicUsize,
    pub flow_queries: AtomicUsize,
    pub path_queries: AtomicUsize,
    pub installed: Mutex<Vec<(String, serde_json::Value)>>,
}

impl FakeController {
    pub fn installs(&self) -> usize {
        self.installed.lock().map(|i| i.len()).unwrap_or_default()
    }
}

#[async_trait]
impl FlowController for FakeController {
    async fn flows_for_device(&self, device_id: &str) -> Result<Vec<FlowRecord>> {
        self.flow_queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_flows {
            return Err(QosError::ControllerUnreachable {
                operation: "flows_for_device",
                device: device_id.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(self.flows.clone())
    }

    async fn alternate_ports(&self, src: &str, dst: &str) -> Result<Vec<String>> {
        self.path_queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_paths {
            return Err(QosError::ControllerUnreachable {
                operation: "alternate_ports",
                device: src.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        match self.paths.get(dst) {
            Some(ports) if !ports.is_empty() => Ok(ports.clone()),
            _ => Err(QosError::NoPathFound {
                src: src.to_string(),
                dst: dst.to_string(),
            }),
        }
    }

    async fn switches_for_host(&self, host: &str) -> Result<Vec<String>> {
        Ok(self.hosts.get(host).cloned().unwrap_or_default())
    }

    async fn install_flow(&self, device_id: &str, rule: &serde_json::Value) -> Result<()> {
        self.install_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.reject_install {
            return Err(QosError::FlowInstallRejected {
                device: device_id.to_string(),
                status,
                body: "rejected".to_string(),
            });
        }
        self.installed
            .lock()
            .unwrap()
            .push((device_id.to_string(), rule.clone()));
        Ok(())
    }
}

/// Telemetry source replaying scripted responses, then repeating `steady`
pub struct ScriptedTelemetry {
    responses: Mutex<VecDeque<Result<Vec<InterfaceSample>>>>,
    steady: Vec<InterfaceSample>,
    pub calls: AtomicUsize,
}

impl ScriptedTelemetry {
    pub fn new(
        responses: Vec<Result<Vec<InterfaceSample>>>,
        steady: Vec<InterfaceSample>,
    ) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            steady,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn steady(samples: Vec<InterfaceSample>) -> Self {
        Self::new(Vec::new(), samples)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelemetrySource for ScriptedTelemetry {
    async fn sample(&self, _metric_names: &[String]) -> Result<Vec<InterfaceSample>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.steady.clone()))
    }
}

pub fn telemetry_down() -> QosError {
    QosError::TelemetryUnavailable {
        endpoint: "http://127.0.0.1:8008".to_string(),
        reason: "status 500".to_string(),
    }
}

/// Telemetry source failing `times` reads, then reporting no interfaces
pub fn failing_telemetry(times: usize) -> ScriptedTelemetry {
    ScriptedTelemetry::new((0..times).map(|_| Err(telemetry_down())).collect(), Vec::new())
}

//! HTTP client for the sFlow-RT style metrics source

use super::TelemetrySource;
use crate::config::TelemetryConfig;
use crate::error::{QosError, Result};
use crate::models::InterfaceSample;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// A metric value as reported by the source: numbers for counters,
/// strings for names and identifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) => Some(*n),
            MetricValue::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Textual form; integral numbers print without a fractional part
    pub fn as_text(&self) -> String {
        match self {
            MetricValue::Number(n) if n.fract() == 0.0 && n.is_finite() => {
                format!("{}", *n as i64)
            }
            MetricValue::Number(n) => n.to_string(),
            MetricValue::Text(s) => s.clone(),
        }
    }
}

/// One cell of a table row
#[derive(Debug, Deserialize)]
struct TableCell {
    #[serde(rename = "metricName")]
    metric_name: String,
    #[serde(rename = "metricValue")]
    metric_value: Option<MetricValue>,
}

/// One entry of a dump response
#[derive(Debug, Deserialize)]
struct DumpEntry {
    #[serde(rename = "dataSource")]
    data_source: String,
    #[serde(rename = "metricValue")]
    metric_value: Option<MetricValue>,
}

/// Flow definition registered with the source so it tracks per-flow bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDefinition {
    pub keys: String,
    pub value: String,
}

/// Client for the metrics source REST API
pub struct SflowClient {
    client: Client,
    endpoint: String,
    agent: String,
    byte_metric: String,
}

impl SflowClient {
    /// Create a new client from configuration
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| QosError::TelemetryUnavailable {
                endpoint: config.endpoint.clone(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            agent: config.agent.clone(),
            byte_metric: config.byte_metric.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn unavailable(&self, reason: impl ToString) -> QosError {
        QosError::TelemetryUnavailable {
            endpoint: self.endpoint.clone(),
            reason: reason.to_string(),
        }
    }

    /// GET a JSON document, mapping transport failures, non-success statuses
    /// and unparseable bodies to unavailability
    async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    self.unavailable(format!("timed out: {}", e))
                } else {
                    self.unavailable(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.unavailable(format!("status {} from {}", status.as_u16(), url)));
        }

        let body = response.text().await.map_err(|e| self.unavailable(e))?;
        serde_json::from_str(&body).map_err(|e| self.unavailable(format!("invalid JSON: {}", e)))
    }

    /// Read the value of one metric for every data source
    pub async fn dump(&self, metric: &str) -> Result<BTreeMap<String, MetricValue>> {
        let url = format!("{}/dump/{}/{}/json", self.endpoint, self.agent, metric);
        let value = self.get_json(&url).await?;
        let entries: Vec<DumpEntry> =
            serde_json::from_value(value).map_err(|e| QosError::malformed("dump", e))?;

        Ok(entries
            .into_iter()
            .filter_map(|entry| entry.metric_value.map(|v| (entry.data_source, v)))
            .collect())
    }

    /// Register a flow definition unless one with the same name exists
    ///
    /// Returns true when the definition was created by this call.
    pub async fn register_flow_definition(
        &self,
        name: &str,
        definition: &FlowDefinition,
    ) -> Result<bool> {
        let url = format!("{}/flow/{}/json", self.endpoint, name);

        let existing = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        match existing.status() {
            status if status.is_success() => {
                debug!(flow = %name, "Flow definition already registered");
                return Ok(false);
            }
            StatusCode::NOT_FOUND => {}
            status => {
                return Err(self.unavailable(format!("status {} from {}", status.as_u16(), url)));
            }
        }

        let response = self
            .client
            .put(&url)
            .json(definition)
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        if !response.status().is_success() {
            return Err(self.unavailable(format!(
                "flow registration returned status {}",
                response.status().as_u16()
            )));
        }

        info!(flow = %name, keys = %definition.keys, "Registered flow definition");
        Ok(true)
    }
}

#[async_trait]
impl TelemetrySource for SflowClient {
    async fn sample(&self, metric_names: &[String]) -> Result<Vec<InterfaceSample>> {
        let url = format!(
            "{}/table/{}/{}/json",
            self.endpoint,
            self.agent,
            metric_names.join(",")
        );
        let value = self.get_json(&url).await?;
        let samples = parse_table(value, &self.byte_metric)?;
        debug!(interfaces = samples.len(), "Sampled interface table");
        Ok(samples)
    }
}

/// Turn a table response into samples
///
/// Rows are lists of metric cells in any order. Unknown metric names are
/// ignored; missing ones leave the field `None`. A document that is not a
/// list of lists of cells is rejected.
pub fn parse_table(value: serde_json::Value, byte_metric: &str) -> Result<Vec<InterfaceSample>> {
    let rows: Vec<Vec<TableCell>> =
        serde_json::from_value(value).map_err(|e| QosError::malformed("table", e))?;

    let samples = rows
        .into_iter()
        .map(|row| {
            let mut sample = InterfaceSample {
                interface_name: None,
                byte_count: None,
                device_id: None,
                port: None,
            };
            for cell in row {
                let Some(value) = cell.metric_value else {
                    continue;
                };
                match cell.metric_name.as_str() {
                    "ifname" => sample.interface_name = Some(value.as_text()),
                    "of_dpid" => sample.device_id = Some(value.as_text()),
                    "of_port" => sample.port = Some(value.as_text()),
                    name if name == byte_metric => sample.byte_count = value.as_f64(),
                    _ => {}
                }
            }
            sample
        })
        .collect();

    Ok(samples)
}

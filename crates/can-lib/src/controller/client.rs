//! REST client for an ONOS-style controller

use super::FlowController;
use crate::config::ControllerConfig;
use crate::error::{QosError, Result};
use crate::models::{compare_ports, FlowRecord};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

/// A port as reported by the controller: a number or a string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PortId {
    Number(u64),
    Text(String),
}

impl PortId {
    fn into_text(self) -> String {
        match self {
            PortId::Number(n) => n.to_string(),
            PortId::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FlowsDocument {
    flows: Vec<FlowEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowEntry {
    app_id: String,
    #[serde(default)]
    treatment: Option<Treatment>,
    #[serde(default)]
    selector: Option<Selector>,
}

#[derive(Debug, Deserialize)]
struct Treatment {
    #[serde(default)]
    instructions: Vec<TypedField>,
}

#[derive(Debug, Deserialize)]
struct Selector {
    #[serde(default)]
    criteria: Vec<TypedField>,
}

/// An instruction or a criterion; only the fields the loop reads
#[derive(Debug, Deserialize)]
struct TypedField {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    port: Option<PortId>,
    #[serde(default)]
    mac: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PathsDocument {
    paths: Vec<PathEntry>,
}

#[derive(Debug, Deserialize)]
struct PathEntry {
    #[serde(default)]
    links: Vec<LinkEntry>,
}

#[derive(Debug, Deserialize)]
struct LinkEntry {
    src: ConnectPoint,
}

#[derive(Debug, Deserialize)]
struct ConnectPoint {
    port: PortId,
}

#[derive(Debug, Deserialize)]
struct HostDocument {
    #[serde(default)]
    locations: Vec<HostLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostLocation {
    element_id: String,
}

/// Client for the controller REST API
pub struct OnosClient {
    client: Client,
    base_url: Url,
    username: String,
    password: String,
    app_id: String,
    forwarding_app: String,
}

impl OnosClient {
    /// Create a new client from configuration
    pub fn new(config: &ControllerConfig) -> Result<Self> {
        let unreachable = |reason: String| QosError::ControllerUnreachable {
            operation: "connect",
            device: String::new(),
            reason,
        };

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| unreachable(format!("failed to create HTTP client: {}", e)))?;

        let mut endpoint = config.endpoint.clone();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        let base_url = Url::parse(&endpoint)
            .and_then(|u| u.join("onos/v1/"))
            .map_err(|e| {
                unreachable(format!("invalid controller URL {}: {}", config.endpoint, e))
            })?;

        Ok(Self {
            client,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            app_id: config.app_id.clone(),
            forwarding_app: config.forwarding_app.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, operation: &'static str, device: &str, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| QosError::ControllerUnreachable {
                operation,
                device: device.to_string(),
                reason: format!("invalid path {}: {}", path, e),
            })
    }

    async fn send(
        &self,
        request: RequestBuilder,
        operation: &'static str,
        device: &str,
    ) -> Result<Response> {
        request
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| QosError::ControllerUnreachable {
                operation,
                device: device.to_string(),
                reason: if e.is_timeout() {
                    format!("timed out: {}", e)
                } else {
                    e.to_string()
                },
            })
    }

    async fn decode<T: DeserializeOwned>(response: Response, operation: &'static str) -> Result<T> {
        let body = response
            .text()
            .await
            .map_err(|e| QosError::malformed(operation, e))?;
        serde_json::from_str(&body).map_err(|e| QosError::malformed(operation, e))
    }

    fn status_error(operation: &'static str, device: &str, status: StatusCode) -> QosError {
        QosError::ControllerUnreachable {
            operation,
            device: device.to_string(),
            reason: format!("status {}", status.as_u16()),
        }
    }
}

#[async_trait]
impl FlowController for OnosClient {
    async fn flows_for_device(&self, device_id: &str) -> Result<Vec<FlowRecord>> {
        const OP: &str = "flows_for_device";
        let url = self.url(OP, device_id, &format!("flows/{}", device_id))?;
        let response = self.send(self.client.get(url), OP, device_id).await?;
        if !response.status().is_success() {
            return Err(Self::status_error(OP, device_id, response.status()));
        }

        let document: FlowsDocument = Self::decode(response, OP).await?;
        let records = extract_flow_records(document, &self.forwarding_app);
        debug!(device_id = %device_id, flows = records.len(), "Read forwarding flows");
        Ok(records)
    }

    async fn alternate_ports(
        &self,
        src_device_id: &str,
        dst_device_id: &str,
    ) -> Result<Vec<String>> {
        const OP: &str = "alternate_ports";
        let no_path = || QosError::NoPathFound {
            src: src_device_id.to_string(),
            dst: dst_device_id.to_string(),
        };

        let path = format!("paths/{}/{}", src_device_id, dst_device_id);
        let url = self.url(OP, src_device_id, &path)?;
        let response = self.send(self.client.get(url), OP, src_device_id).await?;
        match response.status() {
            StatusCode::NOT_FOUND => return Err(no_path()),
            status if !status.is_success() => {
                return Err(Self::status_error(OP, src_device_id, status));
            }
            _ => {}
        }

        let document: PathsDocument = Self::decode(response, OP).await?;
        let mut ports: Vec<String> = document
            .paths
            .into_iter()
            .filter_map(|path| path.links.into_iter().next())
            .map(|link| link.src.port.into_text())
            .collect();
        if ports.is_empty() {
            return Err(no_path());
        }

        ports.sort_by(|a, b| compare_ports(a, b));
        ports.dedup();
        Ok(ports)
    }

    async fn switches_for_host(&self, host_mac: &str) -> Result<Vec<String>> {
        const OP: &str = "switches_for_host";
        let host_id = if host_mac.contains('/') {
            host_mac.to_string()
        } else {
            format!("{}/None", host_mac)
        };

        let url = self.url(OP, &host_id, &format!("hosts/{}", host_id))?;
        let response = self.send(self.client.get(url), OP, &host_id).await?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                warn!(host_id = %host_id, "Host not known to controller");
                return Ok(Vec::new());
            }
            status if !status.is_success() => {
                return Err(Self::status_error(OP, &host_id, status));
            }
            _ => {}
        }

        let document: HostDocument = Self::decode(response, OP).await?;
        let mut switches: Vec<String> = document
            .locations
            .into_iter()
            .map(|location| location.element_id)
            .collect();
        switches.sort();
        switches.dedup();
        Ok(switches)
    }

    async fn install_flow(&self, device_id: &str, rule: &serde_json::Value) -> Result<()> {
        const OP: &str = "install_flow";
        let mut url = self.url(OP, device_id, &format!("flows/{}", device_id))?;
        url.query_pairs_mut().append_pair("appId", &self.app_id);

        let response = self
            .send(self.client.post(url).json(rule), OP, device_id)
            .await?;

        let status = response.status();
        if matches!(status, StatusCode::CREATED | StatusCode::ACCEPTED) {
            info!(device_id = %device_id, app_id = %self.app_id, "Flow rule installed");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(QosError::FlowInstallRejected {
            device: device_id.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

/// Keep rules from the forwarding application that match on both MACs and
/// an ingress port
fn extract_flow_records(document: FlowsDocument, forwarding_app: &str) -> Vec<FlowRecord> {
    document
        .flows
        .into_iter()
        .filter(|flow| flow.app_id == forwarding_app)
        .filter_map(|flow| {
            let out_port = flow
                .treatment
                .into_iter()
                .flat_map(|t| t.instructions)
                .filter(|i| i.kind.as_deref() == Some("OUTPUT"))
                .filter_map(|i| i.port)
                .last()
                .map(PortId::into_text)?;

            let mut in_port = None;
            let mut eth_src = None;
            let mut eth_dst = None;
            for criterion in flow.selector.into_iter().flat_map(|s| s.criteria) {
                match criterion.kind.as_deref() {
                    Some("IN_PORT") => in_port = criterion.port.map(PortId::into_text),
                    Some("ETH_SRC") => eth_src = criterion.mac,
                    Some("ETH_DST") => eth_dst = criterion.mac,
                    _ => {}
                }
            }

            Some(FlowRecord {
                eth_src: eth_src?,
                eth_dst: eth_dst?,
                in_port: in_port.filter(|p| !p.is_empty())?,
                out_port,
            })
        })
        .collect()
}

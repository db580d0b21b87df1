//! Integration tests for the agent API endpoints

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use can_lib::{
    config::{ControllerConfig, EnvironmentConfig, TelemetryConfig},
    controller::{FlowTemplate, OnosClient},
    environment::Environment,
    error::{QosError, Result},
    health::{components, ComponentStatus, HealthRegistry},
    models::InterfaceSample,
    telemetry::TelemetrySource,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

/// Two switch ports on s1 and one host port; fails every read while `down` is set
struct StubTelemetry {
    down: AtomicBool,
}

#[async_trait]
impl TelemetrySource for StubTelemetry {
    async fn sample(&self, _metric_names: &[String]) -> Result<Vec<InterfaceSample>> {
        if self.down.load(Ordering::SeqCst) {
            return Err(QosError::TelemetryUnavailable {
                endpoint: "http://127.0.0.1:8008".to_string(),
                reason: "status 503".to_string(),
            });
        }
        Ok(vec![
            sample("s1-eth1", 1_187_500.0, "1"),
            sample("s1-eth2", 125_000.0, "2"),
            // Host interfaces carry no datapath id
            InterfaceSample {
                device_id: None,
                ..sample("h1-eth0", 125_000.0, "3")
            },
        ])
    }
}

fn sample(ifname: &str, bytes: f64, port: &str) -> InterfaceSample {
    InterfaceSample {
        interface_name: Some(ifname.to_string()),
        byte_count: Some(bytes),
        device_id: Some("0000000000000001".to_string()),
        port: Some(port.to_string()),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub environment: Arc<Environment>,
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;
    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;
    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(readiness))
}

async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

async fn current_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.environment.snapshot().await;
    Json(json!({
        "phase": state.environment.phase(),
        "snapshot": &*snapshot,
    }))
}

fn create_test_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/state", get(current_state))
        .with_state(state)
}

async fn setup_test_app() -> (Router, Arc<AppState>, Arc<StubTelemetry>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::TELEMETRY).await;
    health_registry.register(components::CONTROLLER).await;

    let telemetry = Arc::new(StubTelemetry {
        down: AtomicBool::new(false),
    });
    let environment = Environment::new(
        telemetry.clone(),
        Arc::new(OnosClient::new(&ControllerConfig::default()).unwrap()),
        FlowTemplate::default(),
        &TelemetryConfig::default(),
        EnvironmentConfig {
            read_retries: 0,
            retry_backoff_ms: 0,
            ..Default::default()
        },
    )
    .with_health(health_registry.clone());

    let state = Arc::new(AppState {
        health_registry,
        environment: Arc::new(environment),
    });
    let router = create_test_router(state.clone());

    (router, state, telemetry)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state, _telemetry) = setup_test_app().await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_degrades_after_telemetry_failure() {
    let (app, state, telemetry) = setup_test_app().await;

    telemetry.down.store(true, Ordering::SeqCst);
    assert!(state.environment.observe().await.is_err());

    let (status, health) = get_json(app, "/healthz").await;

    // Degraded still returns 200 (operational)
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
    assert!(health["components"]["telemetry"]["message"]
        .as_str()
        .unwrap()
        .contains("503"));
}

#[tokio::test]
async fn test_healthz_recovers_after_successful_observation() {
    let (app, state, telemetry) = setup_test_app().await;

    telemetry.down.store(true, Ordering::SeqCst);
    assert!(state.environment.observe().await.is_err());
    telemetry.down.store(false, Ordering::SeqCst);
    state.environment.observe().await.unwrap();

    let (_, health) = get_json(app, "/healthz").await;

    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state, _telemetry) = setup_test_app().await;

    state
        .health_registry
        .set_unhealthy(components::CONTROLLER, "unexpected flows document")
        .await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_when_not_ready() {
    let (app, _state, _telemetry) = setup_test_app().await;

    // By default, agent is not ready
    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_readyz_returns_ok_when_ready() {
    let (app, state, _telemetry) = setup_test_app().await;

    state.health_registry.set_ready(true).await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_readyz_returns_503_when_ready_but_unhealthy() {
    let (app, state, _telemetry) = setup_test_app().await;

    state.health_registry.set_ready(true).await;
    state
        .health_registry
        .set_unhealthy(components::TELEMETRY, "Failed")
        .await;

    let (status, _) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_state_is_empty_before_first_observation() {
    let (app, _state, _telemetry) = setup_test_app().await;

    let (status, body) = get_json(app, "/state").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "idle");
    assert!(body["snapshot"]["observed_at"].is_null());
    assert_eq!(body["snapshot"]["links"], json!([]));
}

#[tokio::test]
async fn test_state_reports_latest_observation() {
    let (app, state, _telemetry) = setup_test_app().await;

    state.environment.observe().await.unwrap();

    let (_, body) = get_json(app, "/state").await;

    let links = body["snapshot"]["links"].as_array().unwrap();
    assert_eq!(links.len(), 2);
    assert_eq!(links[0]["device_id"], "of:0000000000000001");
    assert_eq!(links[0]["port"], "1");
    assert_eq!(links[0]["utilization"], 0.95);
    assert_eq!(links[1]["utilization"], 0.1);
    assert!(!body["snapshot"]["observed_at"].is_null());
    assert!((body["snapshot"]["reward"].as_f64().unwrap() + 1.05).abs() < 1e-9);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state, _telemetry) = setup_test_app().await;

    state.environment.observe().await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("can_qos_links_observed"));
    assert!(metrics_text.contains("can_qos_last_reward"));
    assert!(metrics_text.contains("can_qos_telemetry_latency_seconds_bucket"));
    assert!(metrics_text.contains("can_qos_telemetry_latency_seconds_count"));
}

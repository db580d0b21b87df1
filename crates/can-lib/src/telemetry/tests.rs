//! Tests for the telemetry client and poller
//!
//! HTTP behavior is exercised against a local mockito server.

use super::*;
use crate::config::TelemetryConfig;
use crate::error::{QosError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const TABLE_PATH: &str = "/table/TOPOLOGY/ifname,ifinoctets,of_dpid,of_port/json";

fn client_for(url: &str) -> SflowClient {
    let config = TelemetryConfig {
        endpoint: url.to_string(),
        request_timeout_ms: 2_000,
        ..TelemetryConfig::default()
    };
    SflowClient::new(&config).unwrap()
}

/// Listener that accepts connections and never answers them
async fn silent_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}

fn metric_names() -> Vec<String> {
    TelemetryConfig::default().metric_names()
}

mod client_tests {
    use super::*;

    #[tokio::test]
    async fn test_sample_parses_rows_in_any_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", TABLE_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    [
                        {"metricName": "of_port", "metricValue": "2", "agent": "127.0.0.1"},
                        {"metricName": "ifname", "metricValue": "s1-eth2"},
                        {"metricName": "ifinoctets", "metricValue": 125000.0},
                        {"metricName": "of_dpid", "metricValue": "0000000000000001"}
                    ],
                    [
                        {"metricName": "ifname", "metricValue": "s2-eth1"},
                        {"metricName": "of_dpid", "metricValue": "0000000000000002"},
                        {"metricName": "of_port", "metricValue": 1}
                    ]
                ]"#,
            )
            .create_async()
            .await;

        let client = client_for(&server.url());
        let samples = client.sample(&metric_names()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].interface_name.as_deref(), Some("s1-eth2"));
        assert_eq!(samples[0].byte_count, Some(125000.0));
        assert_eq!(samples[0].device_id.as_deref(), Some("0000000000000001"));
        assert_eq!(samples[0].port.as_deref(), Some("2"));

        // Missing byte count stays unavailable, numeric port is normalized
        assert_eq!(samples[1].byte_count, None);
        assert_eq!(samples[1].port.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_sample_fails_on_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", TABLE_PATH)
            .with_status(500)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let err = client.sample(&metric_names()).await.unwrap_err();

        assert!(matches!(err, QosError::TelemetryUnavailable { .. }));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_sample_fails_on_invalid_json() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", TABLE_PATH)
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let client = client_for(&server.url());
        let err = client.sample(&metric_names()).await.unwrap_err();

        assert!(matches!(err, QosError::TelemetryUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_sample_rejects_unexpected_shape() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", TABLE_PATH)
            .with_status(200)
            .with_body(r#"{"interfaces": []}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let err = client.sample(&metric_names()).await.unwrap_err();

        assert!(matches!(err, QosError::MalformedResponse { operation: "table", .. }));
    }

    #[tokio::test]
    async fn test_sample_unreachable_endpoint() {
        // Nothing listens on the discard port
        let client = client_for("http://127.0.0.1:9");
        let err = client.sample(&metric_names()).await.unwrap_err();

        assert!(matches!(err, QosError::TelemetryUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_sample_times_out_on_silent_endpoint() {
        let config = TelemetryConfig {
            endpoint: silent_endpoint().await,
            request_timeout_ms: 100,
            ..TelemetryConfig::default()
        };
        let client = SflowClient::new(&config).unwrap();

        let err = tokio::time::timeout(Duration::from_secs(5), client.sample(&metric_names()))
            .await
            .expect("sample must not hang")
            .unwrap_err();

        match err {
            QosError::TelemetryUnavailable { reason, .. } => assert!(reason.contains("timed out")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dump_maps_data_sources() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/dump/TOPOLOGY/of_port/json")
            .with_status(200)
            .with_body(
                r#"[
                    {"dataSource": "3", "metricName": "of_port", "metricValue": "2"},
                    {"dataSource": "4", "metricName": "of_port", "metricValue": "1"}
                ]"#,
            )
            .create_async()
            .await;

        let client = client_for(&server.url());
        let dump = client.dump("of_port").await.unwrap();

        assert_eq!(dump.len(), 2);
        assert_eq!(dump["3"], MetricValue::Text("2".to_string()));
        assert_eq!(dump["4"].as_text(), "1");
    }

    #[tokio::test]
    async fn test_register_flow_definition_creates_when_missing() {
        let mut server = mockito::Server::new_async().await;
        let _lookup = server
            .mock("GET", "/flow/can-qos/json")
            .with_status(404)
            .create_async()
            .await;
        let create = server
            .mock("PUT", "/flow/can-qos/json")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "keys": "ipsource,ipdestination",
                "value": "bytes"
            })))
            .with_status(204)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let definition = FlowDefinition {
            keys: "ipsource,ipdestination".to_string(),
            value: "bytes".to_string(),
        };
        let created = client
            .register_flow_definition("can-qos", &definition)
            .await
            .unwrap();

        assert!(created);
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_register_flow_definition_is_idempotent() {
        let mut server = mockito::Server::new_async().await;
        let _lookup = server
            .mock("GET", "/flow/can-qos/json")
            .with_status(200)
            .with_body(r#"{"keys": "ipsource,ipdestination", "value": "bytes"}"#)
            .create_async()
            .await;
        let create = server
            .mock("PUT", "/flow/can-qos/json")
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let definition = FlowDefinition {
            keys: "ipsource,ipdestination".to_string(),
            value: "bytes".to_string(),
        };
        let created = client
            .register_flow_definition("can-qos", &definition)
            .await
            .unwrap();

        assert!(!created);
        create.assert_async().await;
    }
}

mod parse_tests {
    use super::*;

    #[test]
    fn test_unknown_metrics_are_ignored() {
        let value = serde_json::json!([[
            {"metricName": "ifspeed", "metricValue": 10000000},
            {"metricName": "ifname", "metricValue": "s1-eth1"}
        ]]);
        let samples = parse_table(value, "ifinoctets").unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].interface_name.as_deref(), Some("s1-eth1"));
        assert_eq!(samples[0].byte_count, None);
    }

    #[test]
    fn test_byte_metric_is_configurable() {
        let value = serde_json::json!([[
            {"metricName": "ifinoctets", "metricValue": 1.0},
            {"metricName": "ifoutoctets", "metricValue": 2.0}
        ]]);
        let samples = parse_table(value, "ifoutoctets").unwrap();
        assert_eq!(samples[0].byte_count, Some(2.0));
    }

    #[test]
    fn test_missing_metric_value_is_unavailable() {
        let value = serde_json::json!([[{"metricName": "of_port"}]]);
        let samples = parse_table(value, "ifinoctets").unwrap();
        assert_eq!(samples[0].port, None);
    }

    #[test]
    fn test_metric_value_text_forms() {
        assert_eq!(MetricValue::Number(2.0).as_text(), "2");
        assert_eq!(MetricValue::Number(2.5).as_text(), "2.5");
        assert_eq!(MetricValue::Text("12.5".to_string()).as_f64(), Some(12.5));
        assert_eq!(MetricValue::Text("n/a".to_string()).as_f64(), None);
    }
}

mod poller_tests {
    use super::*;
    use crate::models::InterfaceSample;

    /// Fake source that fails the first `failures` calls
    struct ScriptedSource {
        calls: AtomicUsize,
        failures: usize,
    }

    impl ScriptedSource {
        fn new(failures: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures,
            }
        }
    }

    #[async_trait]
    impl TelemetrySource for ScriptedSource {
        async fn sample(&self, _metric_names: &[String]) -> Result<Vec<InterfaceSample>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(QosError::TelemetryUnavailable {
                    endpoint: "fake".to_string(),
                    reason: "scripted failure".to_string(),
                });
            }
            Ok(vec![InterfaceSample {
                interface_name: Some("s1-eth1".to_string()),
                byte_count: Some(call as f64),
                device_id: Some("0000000000000001".to_string()),
                port: Some("1".to_string()),
            }])
        }
    }

    fn fast_config(max_ticks: Option<u64>) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(5),
            max_ticks,
            max_consecutive_failures: 3,
            buffer_size: 16,
        }
    }

    #[tokio::test]
    async fn test_poller_stops_after_tick_budget() {
        let source = Arc::new(ScriptedSource::new(0));
        let (poller, mut rx) = Poller::new(source.clone(), metric_names(), fast_config(Some(3)));
        let (_cancel_tx, cancel_rx) = watch::channel(false);

        let summary = poller.run(cancel_rx).await;

        assert_eq!(summary.ticks, 3);
        assert_eq!(summary.successes, 3);
        assert!(!summary.cancelled);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);

        let mut batches = 0;
        while rx.try_recv().is_ok() {
            batches += 1;
        }
        assert_eq!(batches, 3);
    }

    #[tokio::test]
    async fn test_poller_gives_up_after_consecutive_failures() {
        let source = Arc::new(ScriptedSource::new(10));
        let (poller, _rx) = Poller::new(source, metric_names(), fast_config(Some(10)));
        let (_cancel_tx, cancel_rx) = watch::channel(false);

        let summary = poller.run(cancel_rx).await;

        assert_eq!(summary.failures, 3);
        assert_eq!(summary.successes, 0);
        assert_eq!(summary.ticks, 3);
    }

    #[tokio::test]
    async fn test_poller_recovers_from_transient_failure() {
        let source = Arc::new(ScriptedSource::new(1));
        let (poller, _rx) = Poller::new(source, metric_names(), fast_config(Some(4)));
        let (_cancel_tx, cancel_rx) = watch::channel(false);

        let summary = poller.run(cancel_rx).await;

        assert_eq!(summary.failures, 1);
        assert_eq!(summary.successes, 3);
    }

    #[tokio::test]
    async fn test_poller_cancellation() {
        let source = Arc::new(ScriptedSource::new(0));
        let (poller, mut rx) = Poller::new(source, metric_names(), fast_config(None));
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let handle = tokio::spawn(poller.run(cancel_rx));

        // Wait for at least one batch, then cancel
        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert!(first.is_some());
        cancel_tx.send(true).unwrap();

        let summary = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(summary.cancelled);
        assert!(summary.successes >= 1);
    }

    #[tokio::test]
    async fn test_poller_already_cancelled_does_not_poll() {
        let source = Arc::new(ScriptedSource::new(0));
        let (poller, _rx) = Poller::new(source.clone(), metric_names(), fast_config(Some(5)));
        let (_cancel_tx, cancel_rx) = watch::channel(true);

        let summary = poller.run(cancel_rx).await;

        assert!(summary.cancelled);
        assert_eq!(summary.ticks, 0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }
}

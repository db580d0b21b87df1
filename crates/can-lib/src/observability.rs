//! Observability infrastructure for the control loop
//!
//! Provides:
//! - Prometheus metrics (poll latency, episode latency, outcomes, last reward)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_gauge, Gauge,
    Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<QosMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct QosMetricsInner {
    telemetry_latency_seconds: Histogram,
    episode_latency_seconds: Histogram,
    episodes_completed: IntCounter,
    episodes_aborted: IntCounter,
    actions_applied: IntCounter,
    install_rejections: IntCounter,
    telemetry_errors: IntCounter,
    controller_errors: IntCounter,
    links_observed: IntGauge,
    last_reward: Gauge,
}

impl QosMetricsInner {
    fn new() -> Self {
        Self {
            telemetry_latency_seconds: register_histogram!(
                "can_qos_telemetry_latency_seconds",
                "Time spent sampling the interface table",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register telemetry_latency_seconds"),

            episode_latency_seconds: register_histogram!(
                "can_qos_episode_latency_seconds",
                "Time from first observation to reward for one episode",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register episode_latency_seconds"),

            episodes_completed: register_int_counter!(
                "can_qos_episodes_completed_total",
                "Episodes that applied an action and scored the result"
            )
            .expect("Failed to register episodes_completed"),

            episodes_aborted: register_int_counter!(
                "can_qos_episodes_aborted_total",
                "Episodes aborted by a telemetry or controller fault"
            )
            .expect("Failed to register episodes_aborted"),

            actions_applied: register_int_counter!(
                "can_qos_actions_applied_total",
                "Flow rules installed by the control loop"
            )
            .expect("Failed to register actions_applied"),

            install_rejections: register_int_counter!(
                "can_qos_install_rejections_total",
                "Flow installs rejected by the controller"
            )
            .expect("Failed to register install_rejections"),

            telemetry_errors: register_int_counter!(
                "can_qos_telemetry_errors_total",
                "Failed telemetry reads, including retried ones"
            )
            .expect("Failed to register telemetry_errors"),

            controller_errors: register_int_counter!(
                "can_qos_controller_errors_total",
                "Failed controller reads, including retried ones"
            )
            .expect("Failed to register controller_errors"),

            links_observed: register_int_gauge!(
                "can_qos_links_observed",
                "Switch ports in the latest observation"
            )
            .expect("Failed to register links_observed"),

            last_reward: register_gauge!(
                "can_qos_last_reward",
                "Reward of the latest observation"
            )
            .expect("Failed to register last_reward"),
        }
    }
}

/// Control-loop metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct QosMetrics {
    _private: (),
}

impl Default for QosMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl QosMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(QosMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &QosMetricsInner {
        GLOBAL_METRICS.get_or_init(QosMetricsInner::new)
    }

    pub fn observe_telemetry_latency(&self, duration_secs: f64) {
        self.inner().telemetry_latency_seconds.observe(duration_secs);
    }

    pub fn observe_episode_latency(&self, duration_secs: f64) {
        self.inner().episode_latency_seconds.observe(duration_secs);
    }

    pub fn inc_episodes_completed(&self) {
        self.inner().episodes_completed.inc();
    }

    pub fn inc_episodes_aborted(&self) {
        self.inner().episodes_aborted.inc();
    }

    pub fn inc_actions_applied(&self) {
        self.inner().actions_applied.inc();
    }

    pub fn inc_install_rejections(&self) {
        self.inner().install_rejections.inc();
    }

    pub fn inc_telemetry_errors(&self) {
        self.inner().telemetry_errors.inc();
    }

    pub fn inc_controller_errors(&self) {
        self.inner().controller_errors.inc();
    }

    /// Record the size and reward of the latest observation
    pub fn set_observation(&self, links: i64, reward: f64) {
        self.inner().links_observed.set(links);
        self.inner().last_reward.set(reward);
    }
}

/// Structured logger for control-loop events
///
/// Provides consistent JSON-formatted logging for observations, applied
/// actions and episode outcomes.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log a published observation
    pub fn log_states_observed(&self, links: usize, congested: usize, reward: f64) {
        info!(
            event = "states_observed",
            instance = %self.instance,
            links = links,
            congested = congested,
            reward = reward,
            "Observed link states"
        );
    }

    /// Log an installed action
    pub fn log_action_applied(
        &self,
        device_id: &str,
        eth_src: &str,
        eth_dst: &str,
        in_port: &str,
        out_port: &str,
    ) {
        info!(
            event = "action_applied",
            instance = %self.instance,
            device_id = %device_id,
            eth_src = %eth_src,
            eth_dst = %eth_dst,
            in_port = %in_port,
            out_port = %out_port,
            "Installed rewritten flow"
        );
    }

    /// Log a rejected flow install
    pub fn log_install_rejected(&self, device_id: &str, status: u16, body: &str) {
        warn!(
            event = "flow_install_rejected",
            instance = %self.instance,
            device_id = %device_id,
            status = status,
            body = %body,
            "Controller rejected flow install"
        );
    }

    /// Log a finished episode
    pub fn log_episode_completed(
        &self,
        device_id: &str,
        reward_before: f64,
        reward_after: f64,
        elapsed_ms: u64,
    ) {
        info!(
            event = "episode_completed",
            instance = %self.instance,
            device_id = %device_id,
            reward_before = reward_before,
            reward_after = reward_after,
            elapsed_ms = elapsed_ms,
            "Episode completed"
        );
    }

    /// Log an episode ended without an action
    pub fn log_episode_skipped(&self, reason: &str) {
        info!(
            event = "episode_skipped",
            instance = %self.instance,
            reason = %reason,
            "Episode ended without an action"
        );
    }

    /// Log an aborted episode with the phase it failed in
    pub fn log_episode_aborted(&self, phase: &str, error: &str) {
        warn!(
            event = "episode_aborted",
            instance = %self.instance,
            phase = %phase,
            error = %error,
            "Episode aborted"
        );
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, telemetry: &str, controller: &str) {
        info!(
            event = "agent_started",
            instance = %self.instance,
            agent_version = %version,
            telemetry = %telemetry,
            controller = %controller,
            "QoS agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            instance = %self.instance,
            reason = %reason,
            "QoS agent shutting down"
        );
    }
}

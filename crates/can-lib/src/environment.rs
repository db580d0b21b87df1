//! Environment facade: observe -> act -> reward episodes
//!
//! An episode walks `Idle -> Observing -> ActionsEnumerated -> Applying ->
//! ObservingNext -> Idle`. Read-path faults are retried a bounded number of
//! times and then abort the episode; install rejections are never retried.
//!
//! Action application is not transactional. If the caller drops a `step`
//! future after the flow install was submitted, the new rule stays on the
//! device and no reward is recorded for it.

use crate::actions::{ActionSpace, ActionSpaceGenerator, ActionSpaceOutcome};
use crate::config::{CanConfig, EnvironmentConfig, TelemetryConfig};
use crate::controller::{FlowController, FlowTemplate, OnosClient};
use crate::error::{QosError, Result};
use crate::executor::ActionExecutor;
use crate::health::{components, HealthRegistry};
use crate::models::{Action, Episode, LinkState};
use crate::observability::{QosMetrics, StructuredLogger};
use crate::policy::Policy;
use crate::reward::reward;
use crate::state::{congested, StateBuilder, StateMap};
use crate::telemetry::{SflowClient, TelemetrySource};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, warn};

/// Where the facade is within an episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodePhase {
    Idle,
    Observing,
    ActionsEnumerated,
    Applying,
    ObservingNext,
}

impl EpisodePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            EpisodePhase::Idle => "idle",
            EpisodePhase::Observing => "observing",
            EpisodePhase::ActionsEnumerated => "actions_enumerated",
            EpisodePhase::Applying => "applying",
            EpisodePhase::ObservingNext => "observing_next",
        }
    }
}

impl fmt::Display for EpisodePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One published observation
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub observed_at: Option<DateTime<Utc>>,
    pub reward: f64,
    #[serde(rename = "links", serialize_with = "serialize_states")]
    pub states: StateMap,
}

impl StateSnapshot {
    fn empty() -> Self {
        Self {
            observed_at: None,
            reward: 0.0,
            states: StateMap::new(),
        }
    }

    fn observed(states: StateMap) -> Self {
        Self {
            observed_at: Some(Utc::now()),
            reward: reward(states.values()),
            states,
        }
    }

    pub fn links(&self) -> Vec<LinkState> {
        self.states.values().cloned().collect()
    }
}

fn serialize_states<S: Serializer>(
    states: &StateMap,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(states.values())
}

/// How an episode ended
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EpisodeOutcome {
    /// An action was applied and the new state scored
    Completed(Episode),
    /// No link needed relief
    NoTarget,
    /// No forwarding flow used the target port
    NoCandidates { device_id: String, port: String },
    /// Flows used the port but nothing else reaches their destinations
    NoAlternatives { device_id: String, port: String },
    /// The policy declined every action
    Declined { device_id: String, port: String },
}

/// Resets the phase to idle when an episode ends or is dropped
struct PhaseGuard<'a>(&'a watch::Sender<EpisodePhase>);

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(EpisodePhase::Idle);
    }
}

/// Sequences telemetry, action generation and execution into episodes
pub struct Environment {
    telemetry: Arc<dyn TelemetrySource>,
    metric_names: Vec<String>,
    builder: StateBuilder,
    generator: ActionSpaceGenerator,
    executor: ActionExecutor,
    config: EnvironmentConfig,
    snapshot: RwLock<Arc<StateSnapshot>>,
    phase: watch::Sender<EpisodePhase>,
    episode: Mutex<()>,
    health: Option<HealthRegistry>,
    metrics: QosMetrics,
    logger: StructuredLogger,
}

impl Environment {
    pub fn new(
        telemetry: Arc<dyn TelemetrySource>,
        controller: Arc<dyn FlowController>,
        template: FlowTemplate,
        telemetry_config: &TelemetryConfig,
        config: EnvironmentConfig,
    ) -> Self {
        let (phase, _) = watch::channel(EpisodePhase::Idle);

        Self {
            telemetry,
            metric_names: telemetry_config.metric_names(),
            builder: StateBuilder::from_config(telemetry_config),
            generator: ActionSpaceGenerator::new(controller.clone()),
            executor: ActionExecutor::new(controller, template),
            config,
            snapshot: RwLock::new(Arc::new(StateSnapshot::empty())),
            phase,
            episode: Mutex::new(()),
            health: None,
            metrics: QosMetrics::new(),
            logger: StructuredLogger::new("environment"),
        }
    }

    /// Build the HTTP collaborators from configuration
    pub fn from_config(config: &CanConfig) -> Result<Self> {
        let telemetry = Arc::new(SflowClient::new(&config.telemetry)?);
        let controller = Arc::new(OnosClient::new(&config.controller)?);
        let template = match &config.controller.flow_template_path {
            Some(path) => FlowTemplate::load(path)?,
            None => FlowTemplate::default(),
        };

        Ok(Self::new(
            telemetry,
            controller,
            template,
            &config.telemetry,
            config.environment.clone(),
        ))
    }

    /// Report component health into `health`
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Name the instance in structured log events
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.logger = StructuredLogger::new(instance);
        self
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    pub fn phase(&self) -> EpisodePhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<EpisodePhase> {
        self.phase.subscribe()
    }

    /// Latest published observation; never partially updated
    pub async fn snapshot(&self) -> Arc<StateSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Sample telemetry, build states and publish them as the new snapshot
    pub async fn observe(&self) -> Result<Arc<StateSnapshot>> {
        let start = Instant::now();
        let samples = self
            .read_with_retry(components::TELEMETRY, "sample", || {
                self.telemetry.sample(&self.metric_names)
            })
            .await?;
        self.metrics
            .observe_telemetry_latency(start.elapsed().as_secs_f64());

        let snapshot = Arc::new(StateSnapshot::observed(self.builder.build(&samples)));
        *self.snapshot.write().await = snapshot.clone();

        let hot = congested(snapshot.states.values(), self.config.congestion_threshold).len();
        self.metrics
            .set_observation(snapshot.states.len() as i64, snapshot.reward);
        self.logger
            .log_states_observed(snapshot.states.len(), hot, snapshot.reward);
        Ok(snapshot)
    }

    /// Enumerate actions for a congested port
    pub async fn enumerate(&self, device_id: &str, port: &str) -> Result<ActionSpace> {
        self.read_with_retry(components::CONTROLLER, "enumerate", || {
            self.generator.generate(device_id, port)
        })
        .await
    }

    /// Install the rule for `action` once
    pub async fn apply(&self, action: &Action, device_id: &str) -> Result<()> {
        let result = self.executor.apply(action, device_id).await;

        match &result {
            Ok(()) => {
                self.metrics.inc_actions_applied();
                self.logger.log_action_applied(
                    device_id,
                    &action.eth_src,
                    &action.eth_dst,
                    &action.in_port,
                    &action.candidate_out_port,
                );
            }
            Err(QosError::FlowInstallRejected { status, body, .. }) => {
                self.metrics.inc_install_rejections();
                self.logger.log_install_rejected(device_id, *status, body);
            }
            Err(_) => self.metrics.inc_controller_errors(),
        }
        if let Some(health) = &self.health {
            health.record(components::CONTROLLER, &result).await;
        }
        result
    }

    /// Run one episode driven by `policy`
    ///
    /// Only one episode runs at a time. Any telemetry or controller fault
    /// aborts the episode and is returned to the caller.
    pub async fn step(&self, policy: &dyn Policy) -> Result<EpisodeOutcome> {
        let _episode = self.episode.lock().await;
        let _phase = PhaseGuard(&self.phase);
        let start = Instant::now();

        let result = self.run_episode(policy, start).await;

        match &result {
            Ok(EpisodeOutcome::Completed(_)) => self.metrics.inc_episodes_completed(),
            Ok(outcome) => {
                let reason = match outcome {
                    EpisodeOutcome::NoTarget => "no_target",
                    EpisodeOutcome::NoCandidates { .. } => "no_candidates",
                    EpisodeOutcome::NoAlternatives { .. } => "no_alternatives",
                    _ => "declined",
                };
                self.logger.log_episode_skipped(reason);
            }
            Err(e) => {
                self.metrics.inc_episodes_aborted();
                self.logger.log_episode_aborted(self.phase().as_str(), &e.to_string());
            }
        }
        if let Some(health) = &self.health {
            health.record(components::ENVIRONMENT, &result).await;
        }
        result
    }

    async fn run_episode(&self, policy: &dyn Policy, start: Instant) -> Result<EpisodeOutcome> {
        self.phase.send_replace(EpisodePhase::Observing);
        let before = self.observe().await?;

        let Some(target) = policy.select_target(&before.states) else {
            debug!("No congested link, ending episode");
            return Ok(EpisodeOutcome::NoTarget);
        };

        let space = self.enumerate(&target.device_id, &target.port).await?;
        self.phase.send_replace(EpisodePhase::ActionsEnumerated);

        let device_id = target.device_id.clone();
        let port = target.port.clone();
        match space.outcome {
            ActionSpaceOutcome::NoCandidates => {
                return Ok(EpisodeOutcome::NoCandidates { device_id, port })
            }
            ActionSpaceOutcome::NoAlternatives => {
                return Ok(EpisodeOutcome::NoAlternatives { device_id, port })
            }
            ActionSpaceOutcome::Available => {}
        }

        let Some(action) = policy
            .select_action(&space, &before.states)
            .and_then(|idx| space.actions.get(idx))
            .cloned()
        else {
            return Ok(EpisodeOutcome::Declined { device_id, port });
        };

        self.phase.send_replace(EpisodePhase::Applying);
        self.apply(&action, &device_id).await?;

        self.phase.send_replace(EpisodePhase::ObservingNext);
        let after = self.observe().await?;

        let elapsed = start.elapsed();
        self.metrics.observe_episode_latency(elapsed.as_secs_f64());
        self.logger.log_episode_completed(
            &device_id,
            before.reward,
            after.reward,
            elapsed.as_millis() as u64,
        );

        Ok(EpisodeOutcome::Completed(Episode {
            device_id,
            state_before: before.links(),
            action,
            state_after: after.links(),
            reward: after.reward,
        }))
    }

    /// Retry transient read failures with a fixed backoff
    async fn read_with_retry<T, F, Fut>(
        &self,
        component: &'static str,
        operation: &'static str,
        mut call: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.config.read_retries + 1;
        let mut attempt = 1;

        let result = loop {
            let result = call().await;
            if let Err(e) = &result {
                if component == components::TELEMETRY {
                    self.metrics.inc_telemetry_errors();
                } else {
                    self.metrics.inc_controller_errors();
                }
                if e.is_transient() && attempt < attempts {
                    warn!(
                        operation = operation,
                        attempt = attempt,
                        attempts = attempts,
                        error = %e,
                        "Transient read failure, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(self.config.retry_backoff()).await;
                    continue;
                }
            }
            break result;
        };

        if let Some(health) = &self.health {
            health.record(component, &result).await;
        }
        result
    }
}

//! Periodic observe / episode loop

use crate::config::LoopMode;
use can_lib::environment::{Environment, EpisodeOutcome};
use can_lib::policy::GreedyPolicy;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Counters for a finished loop
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoopSummary {
    pub iterations: u64,
    pub failures: u64,
    pub actions_applied: u64,
}

/// Run until `shutdown` flips to true or its sender is dropped
///
/// Faults are already logged and counted by the environment; the loop only
/// keeps going on the next tick.
pub async fn run(
    environment: Arc<Environment>,
    mode: LoopMode,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> LoopSummary {
    let policy = GreedyPolicy::new(environment.config().congestion_threshold);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut summary = LoopSummary::default();

    info!(mode = ?mode, period_ms = period.as_millis() as u64, "Starting control loop");

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        }

        summary.iterations += 1;
        let ok = match mode {
            LoopMode::Observe => environment.observe().await.is_ok(),
            LoopMode::Greedy => match environment.step(&policy).await {
                Ok(EpisodeOutcome::Completed(episode)) => {
                    summary.actions_applied += 1;
                    debug!(reward = episode.reward, "Episode recorded");
                    true
                }
                Ok(_) => true,
                Err(_) => false,
            },
        };
        if !ok {
            summary.failures += 1;
        }
    }

    info!(
        iterations = summary.iterations,
        failures = summary.failures,
        actions_applied = summary.actions_applied,
        "Control loop stopped"
    );
    summary
}

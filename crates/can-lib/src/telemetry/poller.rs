//! Bounded, cancellable telemetry polling
//!
//! Polls a telemetry source at a fixed interval and forwards each batch of
//! samples over a channel. The loop ends after a fixed number of ticks, on
//! cancellation, or after too many consecutive failures.

use super::TelemetrySource;
use crate::models::InterfaceSample;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Configuration for the polling loop
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay between polls (default: 1 second)
    pub interval: Duration,
    /// Number of polls before the loop stops; `None` runs until cancelled
    pub max_ticks: Option<u64>,
    /// Consecutive failures tolerated before giving up
    pub max_consecutive_failures: u32,
    /// Channel buffer size for sample batches
    pub buffer_size: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_ticks: None,
            max_consecutive_failures: 3,
            buffer_size: 16,
        }
    }
}

/// Outcome of a polling run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollSummary {
    pub ticks: u64,
    pub successes: u64,
    pub failures: u64,
    pub cancelled: bool,
}

/// Polling loop over a telemetry source
pub struct Poller {
    source: Arc<dyn TelemetrySource>,
    metric_names: Vec<String>,
    config: PollerConfig,
    samples_tx: mpsc::Sender<Vec<InterfaceSample>>,
}

impl Poller {
    /// Create a poller and the receiver for its sample batches
    pub fn new(
        source: Arc<dyn TelemetrySource>,
        metric_names: Vec<String>,
        config: PollerConfig,
    ) -> (Self, mpsc::Receiver<Vec<InterfaceSample>>) {
        let (samples_tx, samples_rx) = mpsc::channel(config.buffer_size.max(1));

        (
            Self {
                source,
                metric_names,
                config,
                samples_tx,
            },
            samples_rx,
        )
    }

    /// Run until the tick budget is spent, `cancel` flips to true, the
    /// receiver is dropped, or failures exceed the configured bound.
    /// Dropping the cancellation sender also stops the loop.
    pub async fn run(self, mut cancel: watch::Receiver<bool>) -> PollSummary {
        let mut summary = PollSummary::default();
        let mut consecutive_failures = 0u32;
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            max_ticks = ?self.config.max_ticks,
            "Starting telemetry poller"
        );

        loop {
            if *cancel.borrow() {
                summary.cancelled = true;
                break;
            }
            if let Some(max) = self.config.max_ticks {
                if summary.ticks >= max {
                    break;
                }
            }

            tokio::select! {
                _ = ticker.tick() => {}
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        summary.cancelled = true;
                        break;
                    }
                    continue;
                }
            }

            summary.ticks += 1;
            let result = tokio::select! {
                result = self.source.sample(&self.metric_names) => result,
                _ = cancel.changed() => {
                    summary.cancelled = true;
                    break;
                }
            };

            match result {
                Ok(samples) => {
                    summary.successes += 1;
                    consecutive_failures = 0;
                    let sent = tokio::select! {
                        sent = self.samples_tx.send(samples) => sent.is_ok(),
                        _ = cancel.changed() => {
                            summary.cancelled = true;
                            break;
                        }
                    };
                    if !sent {
                        debug!("Sample receiver dropped, stopping poller");
                        break;
                    }
                }
                Err(e) => {
                    summary.failures += 1;
                    consecutive_failures += 1;
                    warn!(error = %e, consecutive_failures, "Telemetry poll failed");
                    if consecutive_failures >= self.config.max_consecutive_failures {
                        warn!("Giving up after repeated telemetry failures");
                        break;
                    }
                }
            }
        }

        info!(
            ticks = summary.ticks,
            successes = summary.successes,
            failures = summary.failures,
            cancelled = summary.cancelled,
            "Telemetry poller stopped"
        );
        summary
    }
}

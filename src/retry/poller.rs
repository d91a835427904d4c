// src/retry/poller.rs

use super::{delay_for, AttemptRecord};
use crate::health::{Probe, ProbeError};
use crate::metrics::MetricsCollector;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PollError {
    #[error("probe `{probe}` not ready after {attempts} attempts: {last}")]
    Exhausted {
        probe: String,
        attempts: u32,
        last: ProbeError,
    },

    #[error("cancelled while polling `{probe}`")]
    Cancelled { probe: String },
}

impl PollError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PollError::Cancelled { .. })
    }
}

/// Attempt log plus verdict for one probe.
#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub attempts: Vec<AttemptRecord>,
    pub result: Result<(), PollError>,
}

/// Bounded retry-with-delay around a [`Probe`], cancellable at every sleep
/// and probe boundary.
#[derive(Debug, Clone, Default)]
pub struct RetryPoller {
    cancel: CancellationToken,
    metrics: Option<Arc<MetricsCollector>>,
}

impl RetryPoller {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Call `probe.check()` until it succeeds, the attempt budget runs out,
    /// or the poller is cancelled.
    pub async fn poll_until_ready(&self, unit: &str, probe: &dyn Probe) -> PollOutcome {
        self.poll_after(unit, probe, 0).await
    }

    /// Same as [`poll_until_ready`](Self::poll_until_ready), numbering
    /// attempts from `prior_attempts + 1` so a restarted unit keeps one
    /// increasing sequence per probe. The budget is a full `max_attempts`.
    pub async fn poll_after(&self, unit: &str, probe: &dyn Probe, prior_attempts: u32) -> PollOutcome {
        let config = probe.retry();
        let max_attempts = config.max_attempts.max(1);
        let mut attempts = Vec::with_capacity(max_attempts as usize);
        let cancelled = || PollError::Cancelled {
            probe: probe.name().to_string(),
        };

        for round in 1..=max_attempts {
            let attempt = prior_attempts.saturating_add(round);
            if self.cancel.is_cancelled() {
                return PollOutcome {
                    attempts,
                    result: Err(cancelled()),
                };
            }

            let timestamp = Utc::now();
            let start = Instant::now();
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return PollOutcome { attempts, result: Err(cancelled()) };
                }
                result = probe.check() => result,
            };
            let latency = start.elapsed();

            let record = AttemptRecord::new(probe.name(), attempt, timestamp, &result, latency);
            if let Some(metrics) = &self.metrics {
                metrics.record_attempt(unit, probe.name(), record.outcome, latency);
            }
            attempts.push(record);

            let error = match result {
                Ok(()) => {
                    debug!(unit, probe = probe.name(), attempt, "probe ready");
                    return PollOutcome {
                        attempts,
                        result: Ok(()),
                    };
                }
                Err(error) => error,
            };

            if round >= max_attempts {
                warn!(
                    unit,
                    probe = probe.name(),
                    attempts = round,
                    %error,
                    "probe exhausted its attempts"
                );
                return PollOutcome {
                    attempts,
                    result: Err(PollError::Exhausted {
                        probe: probe.name().to_string(),
                        attempts: round,
                        last: error,
                    }),
                };
            }

            let delay = delay_for(config, round);
            debug!(
                unit,
                probe = probe.name(),
                attempt,
                %error,
                "probe not ready, retrying in {:?}",
                delay
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return PollOutcome { attempts, result: Err(cancelled()) };
                }
                _ = sleep(delay) => {}
            }
        }

        // max_attempts >= 1, so the loop always returns.
        PollOutcome {
            attempts,
            result: Err(cancelled()),
        }
    }
}

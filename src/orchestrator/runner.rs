// src/orchestrator/runner.rs
use super::state::{UnitError, UnitResult, UnitState, UnitTracker};
use crate::config::FailurePolicy;
use crate::metrics::MetricsCollector;
use crate::retry::{PollOutcome, RetryPoller};
use crate::service::{DependencyPlan, ServiceUnit};
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Executes a [`DependencyPlan`] one unit at a time, in plan order.
///
/// Unit failures are recorded in the returned results, never raised.
pub struct Orchestrator {
    plan: DependencyPlan,
    policy: FailurePolicy,
    cancel: CancellationToken,
    concurrent_probes: bool,
    metrics: Option<Arc<MetricsCollector>>,
}

enum Next {
    Proceed,
    Stop(UnitError),
}

impl Orchestrator {
    pub fn new(plan: DependencyPlan, policy: FailurePolicy) -> Self {
        Self {
            plan,
            policy,
            cancel: CancellationToken::new(),
            concurrent_probes: true,
            metrics: None,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_concurrent_probes(mut self, concurrent: bool) -> Self {
        self.concurrent_probes = concurrent;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn plan(&self) -> &DependencyPlan {
        &self.plan
    }

    /// Run every unit and return one result per unit, in plan order.
    pub async fn run(&self) -> Vec<UnitResult> {
        let mut results = Vec::with_capacity(self.plan.len());
        let mut stop: Option<UnitError> = None;

        info!(units = self.plan.len(), policy = %self.policy, "starting plan");

        for unit in self.plan.units() {
            let tracker = UnitTracker::new(unit.id(), unit.display_name());

            if self.cancel.is_cancelled() {
                let mut tracker = tracker;
                tracker.fail(UnitError::Cancelled);
                results.push(self.finish(tracker));
                continue;
            }

            if let Some(reason) = &stop {
                results.push(tracker.skip(reason.clone()));
                continue;
            }

            let (result, next) = self.run_unit(unit, tracker).await;
            results.push(result);
            if let Next::Stop(reason) = next {
                stop = Some(reason);
            }
        }

        let ready = results.iter().filter(|r| r.ready).count();
        info!(ready, total = results.len(), "plan finished");
        results
    }

    async fn run_unit(&self, unit: &ServiceUnit, mut tracker: UnitTracker) -> (UnitResult, Next) {
        self.start_and_probe(unit, &mut tracker).await;

        let retryable = tracker
            .error()
            .map(|error| !error.is_cancelled())
            .unwrap_or(false);

        if retryable && self.policy == FailurePolicy::RestartOnce {
            warn!(unit = unit.id(), "unit failed, restarting once");
            if let Some(metrics) = &self.metrics {
                metrics.record_restart(unit.id());
            }
            if let Err(error) = unit.action().stop().await {
                warn!(unit = unit.id(), %error, "stop before restart failed");
            }
            self.start_and_probe(unit, &mut tracker).await;
        }

        let next = match tracker.error() {
            None => Next::Proceed,
            Some(error) => {
                warn!(unit = unit.id(), %error, "unit failed");
                match self.policy {
                    FailurePolicy::Continue => Next::Proceed,
                    FailurePolicy::Abort | FailurePolicy::RestartOnce => {
                        Next::Stop(UnitError::Skipped(unit.id().to_string()))
                    }
                }
            }
        };

        (self.finish(tracker), next)
    }

    async fn start_and_probe(&self, unit: &ServiceUnit, tracker: &mut UnitTracker) {
        tracker.transition(UnitState::Starting);

        let started = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracker.fail(UnitError::Cancelled);
                return;
            }
            started = unit.action().start() => started,
        };
        if let Err(error) = started {
            tracker.fail(UnitError::Start(error));
            return;
        }

        tracker.transition(UnitState::Probing);

        let poller = match &self.metrics {
            Some(metrics) => RetryPoller::new(self.cancel.clone()).with_metrics(metrics.clone()),
            None => RetryPoller::new(self.cancel.clone()),
        };

        let outcomes = if self.concurrent_probes {
            join_all(unit.probes().iter().map(|probe| {
                let prior = tracker.attempts_for(probe.name());
                poller.poll_after(unit.id(), probe.as_ref(), prior)
            }))
            .await
        } else {
            let mut outcomes = Vec::with_capacity(unit.probes().len());
            for probe in unit.probes() {
                let prior = tracker.attempts_for(probe.name());
                let outcome = poller.poll_after(unit.id(), probe.as_ref(), prior).await;
                let failed = outcome.result.is_err();
                outcomes.push(outcome);
                if failed {
                    break;
                }
            }
            outcomes
        };

        let mut first_error = None;
        for PollOutcome { attempts, result } in outcomes {
            tracker.record_attempts(attempts);
            if let Err(error) = result {
                first_error.get_or_insert(error);
            }
        }

        match first_error {
            None => tracker.transition(UnitState::Ready),
            Some(error) => tracker.fail(UnitError::Probe(error)),
        }
    }

    fn finish(&self, tracker: UnitTracker) -> UnitResult {
        let result = tracker.finish();
        if let Some(metrics) = &self.metrics {
            metrics.update_unit_ready(&result.unit_id, result.ready);
        }
        result
    }
}

// src/orchestrator/mod.rs
mod runner;
mod state;

pub use crate::config::FailurePolicy;
pub use runner::Orchestrator;
pub use state::{UnitError, UnitResult, UnitState};

use crate::checks::{CheckResult, CheckStatus, CheckSuite};
use crate::config::{ConfigError, PlanConfig, Settings};
use crate::metrics::MetricsCollector;
use crate::report::{aggregate, Report};
use crate::service::DependencyPlan;
use reqwest::Client;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Bring up every unit of `config`, then run its checks and aggregate a report.
///
/// Checks are not run once `cancel` has fired; a single WARN entry records
/// that instead.
pub async fn run_plan(
    config: &PlanConfig,
    settings: &Settings,
    client: &Client,
    cancel: CancellationToken,
    metrics: Option<Arc<MetricsCollector>>,
) -> Result<Report, ConfigError> {
    let started = Instant::now();

    let plan = DependencyPlan::from_config(config, client)?;
    let mut suite = CheckSuite::from_config(&config.checks, client)?;

    let mut orchestrator = Orchestrator::new(plan, settings.policy)
        .with_cancellation(cancel.clone())
        .with_concurrent_probes(settings.concurrent_probes);
    if let Some(metrics) = &metrics {
        orchestrator = orchestrator.with_metrics(metrics.clone());
        suite = suite.with_metrics(metrics.clone());
    }

    let unit_results = orchestrator.run().await;

    let check_results = if cancel.is_cancelled() {
        warn!("run cancelled, skipping checks");
        vec![CheckResult::new(
            "checks",
            CheckStatus::Warn,
            "skipped (cancelled)",
        )]
    } else {
        info!(checks = suite.len(), "running checks");
        suite.run_all(&unit_results).await
    };

    let report = aggregate(unit_results, check_results).with_plan(config.digest(), settings.policy);

    let elapsed = started.elapsed();
    if let Some(metrics) = &metrics {
        metrics.set_run_duration(elapsed);
    }
    info!(
        ready = report.ready(),
        pass = report.summary.pass_count,
        fail = report.summary.fail_count,
        warn = report.summary.warn_count,
        elapsed_ms = elapsed.as_millis() as u64,
        "run complete"
    );

    Ok(report)
}

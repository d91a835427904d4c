// src/checks/suite.rs
use super::{EndpointCheck, FileCheck, ToolCheck};
use crate::config::{CheckConfig, CheckTarget, ConfigError, Severity};
use crate::metrics::MetricsCollector;
use crate::orchestrator::UnitResult;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Pass,
    Fail,
    Warn,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "PASS",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Warn => "WARN",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub check_name: String,
    pub status: CheckStatus,
    pub detail: String,
}

impl CheckResult {
    pub fn new(check_name: impl Into<String>, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            check_name: check_name.into(),
            status,
            detail: detail.into(),
        }
    }
}

/// One independent verification. `Ok` carries a detail line for a PASS;
/// an error is a FAIL (or WARN for `Severity::Warn` checks).
#[async_trait]
pub trait Check: Send + Sync {
    fn name(&self) -> &str;

    fn severity(&self) -> Severity {
        Severity::Fail
    }

    /// Units that must be ready for this check to be meaningful.
    fn after(&self) -> &[String] {
        &[]
    }

    async fn run(&self) -> anyhow::Result<String>;
}

/// Wraps a check with the settings it was configured with.
struct Configured {
    inner: Box<dyn Check>,
    severity: Severity,
    after: Vec<String>,
}

#[async_trait]
impl Check for Configured {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn after(&self) -> &[String] {
        &self.after
    }

    async fn run(&self) -> anyhow::Result<String> {
        self.inner.run().await
    }
}

/// A named collection of independent checks.
#[derive(Clone, Default)]
pub struct CheckSuite {
    checks: Vec<Arc<dyn Check>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl CheckSuite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(configs: &[CheckConfig], client: &Client) -> Result<Self, ConfigError> {
        let mut suite = Self::new();
        for config in configs {
            let inner: Box<dyn Check> = match &config.target {
                CheckTarget::Endpoint(endpoint) => Box::new(EndpointCheck::new(
                    config.name.clone(),
                    endpoint.to_endpoint()?,
                    client.clone(),
                )),
                CheckTarget::File(path) => Box::new(FileCheck::new(config.name.clone(), path.clone())),
                CheckTarget::Tool(tool) => Box::new(ToolCheck::new(config.name.clone(), tool.clone())),
            };
            suite = suite.with_check(Arc::new(Configured {
                inner,
                severity: config.severity,
                after: config.after.clone(),
            }));
        }
        Ok(suite)
    }

    pub fn with_check(mut self, check: Arc<dyn Check>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Run every check concurrently and return results in suite order.
    ///
    /// Each check runs in its own task, so an error or a panic in one
    /// becomes a single FAIL entry. `units` are the settled results of the
    /// plan; a check whose `after` unit is not ready is reported as WARN
    /// without running.
    pub async fn run_all(&self, units: &[UnitResult]) -> Vec<CheckResult> {
        let readiness: HashMap<&str, bool> = units
            .iter()
            .map(|unit| (unit.unit_id.as_str(), unit.ready))
            .collect();

        let mut tasks = Vec::with_capacity(self.checks.len());
        for check in &self.checks {
            let blocked = check
                .after()
                .iter()
                .find(|id| !readiness.get(id.as_str()).copied().unwrap_or(false))
                .cloned();

            let check = check.clone();
            tasks.push(tokio::spawn(async move {
                if let Some(unit) = blocked {
                    return CheckResult::new(
                        check.name(),
                        CheckStatus::Warn,
                        format!("skipped: dependency {unit} not ready"),
                    );
                }
                match check.run().await {
                    Ok(detail) => CheckResult::new(check.name(), CheckStatus::Pass, detail),
                    Err(error) => {
                        let status = match check.severity() {
                            Severity::Fail => CheckStatus::Fail,
                            Severity::Warn => CheckStatus::Warn,
                        };
                        CheckResult::new(check.name(), status, format!("{error:#}"))
                    }
                }
            }));
        }

        let mut results = Vec::with_capacity(tasks.len());
        for (check, task) in self.checks.iter().zip(tasks) {
            let result = match task.await {
                Ok(result) => result,
                Err(join_error) => {
                    error!(check = check.name(), %join_error, "check task failed");
                    CheckResult::new(
                        check.name(),
                        CheckStatus::Fail,
                        format!("check aborted: {join_error}"),
                    )
                }
            };

            match result.status {
                CheckStatus::Pass => debug!(check = %result.check_name, detail = %result.detail, "check passed"),
                _ => warn!(check = %result.check_name, status = %result.status, detail = %result.detail, "check did not pass"),
            }
            if let Some(metrics) = &self.metrics {
                metrics.record_check(result.status);
            }
            results.push(result);
        }

        results
    }
}

impl fmt::Debug for CheckSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckSuite")
            .field(
                "checks",
                &self.checks.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

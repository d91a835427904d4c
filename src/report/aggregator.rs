// src/report/aggregator.rs
use crate::checks::{CheckResult, CheckStatus};
use crate::config::FailurePolicy;
use crate::orchestrator::UnitResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Summary {
    pub pass_count: usize,
    pub fail_count: usize,
    pub warn_count: usize,
}

impl Summary {
    /// Ready units and PASS checks count as passes, failed units and FAIL
    /// checks as failures, WARN checks as warnings. Units skipped by an
    /// aborted plan are in none of the counts.
    pub fn from_results(units: &[UnitResult], checks: &[CheckResult]) -> Self {
        let mut summary = Summary::default();

        for unit in units {
            if unit.ready {
                summary.pass_count += 1;
            } else if unit.failed() {
                summary.fail_count += 1;
            }
        }

        for check in checks {
            match check.status {
                CheckStatus::Pass => summary.pass_count += 1,
                CheckStatus::Fail => summary.fail_count += 1,
                CheckStatus::Warn => summary.warn_count += 1,
            }
        }

        summary
    }

    pub fn ready(&self) -> bool {
        self.fail_count == 0
    }
}

/// The outcome of one bring-up run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<FailurePolicy>,
    pub unit_results: Vec<UnitResult>,
    pub check_results: Vec<CheckResult>,
    pub summary: Summary,
}

impl Report {
    pub fn with_plan(mut self, digest: impl Into<String>, policy: FailurePolicy) -> Self {
        self.plan_digest = Some(digest.into());
        self.policy = Some(policy);
        self
    }

    pub fn ready(&self) -> bool {
        self.summary.ready()
    }

    pub fn units_ready(&self) -> impl Iterator<Item = &UnitResult> {
        self.unit_results.iter().filter(|unit| unit.ready)
    }

    pub fn units_failed(&self) -> impl Iterator<Item = &UnitResult> {
        self.unit_results.iter().filter(|unit| unit.failed())
    }
}

/// Merge unit and check results into a report. Result order is preserved.
pub fn aggregate(unit_results: Vec<UnitResult>, check_results: Vec<CheckResult>) -> Report {
    let summary = Summary::from_results(&unit_results, &check_results);

    Report {
        run_id: Uuid::new_v4(),
        timestamp: Utc::now(),
        plan_digest: None,
        policy: None,
        unit_results,
        check_results,
        summary,
    }
}

// src/retry/record.rs
use crate::health::ProbeError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    Success,
    Timeout,
    Error,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Timeout => "timeout",
            AttemptOutcome::Error => "error",
        }
    }
}

/// One probe attempt. Records are appended in attempt order and never
/// rewritten.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub probe_name: String,
    pub attempt_number: u32,
    pub timestamp: DateTime<Utc>,
    pub outcome: AttemptOutcome,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProbeError>,
}

impl AttemptRecord {
    pub fn new(
        probe_name: &str,
        attempt_number: u32,
        timestamp: DateTime<Utc>,
        result: &Result<(), ProbeError>,
        latency: Duration,
    ) -> Self {
        let (outcome, error) = match result {
            Ok(()) => (AttemptOutcome::Success, None),
            Err(e @ ProbeError::Timeout { .. }) => (AttemptOutcome::Timeout, Some(e.clone())),
            Err(e) => (AttemptOutcome::Error, Some(e.clone())),
        };

        Self {
            probe_name: probe_name.to_string(),
            attempt_number,
            timestamp,
            outcome,
            latency_ms: latency.as_millis() as u64,
            error,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == AttemptOutcome::Success
    }
}

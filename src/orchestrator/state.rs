// src/orchestrator/state.rs
use crate::retry::{AttemptRecord, PollError};
use crate::service::StartActionError;
use serde::Serialize;
use std::fmt;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitState {
    Pending,
    Starting,
    Probing,
    Ready,
    Failed,
}

impl UnitState {
    pub fn can_transition_to(self, next: UnitState) -> bool {
        use UnitState::*;
        matches!(
            (self, next),
            (Pending, Starting)
                | (Pending, Failed)
                | (Starting, Probing)
                | (Starting, Failed)
                | (Probing, Ready)
                | (Probing, Failed)
                // restart-once re-enters Starting
                | (Failed, Starting)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, UnitState::Ready | UnitState::Failed)
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitState::Pending => "pending",
            UnitState::Starting => "starting",
            UnitState::Probing => "probing",
            UnitState::Ready => "ready",
            UnitState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why a unit did not become ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum UnitError {
    #[error("start action failed: {0}")]
    Start(StartActionError),

    #[error("{0}")]
    Probe(PollError),

    #[error("cancelled")]
    Cancelled,

    #[error("skipped after `{0}` failed")]
    Skipped(String),
}

impl UnitError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            UnitError::Cancelled => true,
            UnitError::Probe(poll) => poll.is_cancelled(),
            _ => false,
        }
    }
}

/// Outcome of one unit in one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitResult {
    pub unit_id: String,
    pub display_name: String,
    pub state: UnitState,
    pub started: bool,
    pub ready: bool,
    pub start_invocations: u32,
    pub attempts: Vec<AttemptRecord>,
    pub final_error: Option<UnitError>,
}

impl UnitResult {
    pub fn failed(&self) -> bool {
        self.state == UnitState::Failed
    }

    pub fn skipped(&self) -> bool {
        self.state == UnitState::Pending
    }
}

/// Drives one unit through its state machine and accumulates its result.
#[derive(Debug)]
pub(crate) struct UnitTracker {
    result: UnitResult,
}

impl UnitTracker {
    pub(crate) fn new(unit_id: &str, display_name: &str) -> Self {
        Self {
            result: UnitResult {
                unit_id: unit_id.to_string(),
                display_name: display_name.to_string(),
                state: UnitState::Pending,
                started: false,
                ready: false,
                start_invocations: 0,
                attempts: Vec::new(),
                final_error: None,
            },
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> UnitState {
        self.result.state
    }

    pub(crate) fn transition(&mut self, next: UnitState) {
        let current = self.result.state;
        if !current.can_transition_to(next) {
            error!(unit = %self.result.unit_id, %current, %next, "invalid unit state transition");
            return;
        }
        info!(unit = %self.result.unit_id, from = %current, to = %next, "unit state");
        self.result.state = next;

        match next {
            UnitState::Starting => {
                self.result.start_invocations += 1;
                self.result.final_error = None;
            }
            UnitState::Probing => self.result.started = true,
            UnitState::Ready => self.result.ready = true,
            _ => {}
        }
    }

    pub(crate) fn fail(&mut self, error: UnitError) {
        self.transition(UnitState::Failed);
        self.result.final_error = Some(error);
    }

    pub(crate) fn record_attempts(&mut self, attempts: Vec<AttemptRecord>) {
        self.result.attempts.extend(attempts);
    }

    /// Attempts already recorded for `probe`, across earlier start rounds.
    pub(crate) fn attempts_for(&self, probe: &str) -> u32 {
        self.result
            .attempts
            .iter()
            .filter(|record| record.probe_name == probe)
            .count() as u32
    }

    pub(crate) fn error(&self) -> Option<&UnitError> {
        self.result.final_error.as_ref()
    }

    /// A unit that was never reached because the plan stopped early.
    pub(crate) fn skip(mut self, reason: UnitError) -> UnitResult {
        self.result.final_error = Some(reason);
        self.result
    }

    pub(crate) fn finish(self) -> UnitResult {
        self.result
    }
}

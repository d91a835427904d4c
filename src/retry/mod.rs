// src/retry/mod.rs
mod poller;
mod record;
mod strategy;

pub use poller::{PollError, PollOutcome, RetryPoller};
pub use record::{AttemptOutcome, AttemptRecord};
pub use strategy::delay_for;

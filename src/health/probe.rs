// src/health/probe.rs
use crate::config::RetryConfig;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProbeError {
    #[error("no response within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

/// A single readiness test. Implementations perform exactly one attempt per
/// `check` call; retrying is the poller's job.
#[async_trait]
pub trait Probe: Send + Sync {
    fn name(&self) -> &str;

    /// Attempt budget and spacing for this probe.
    fn retry(&self) -> &RetryConfig;

    async fn check(&self) -> Result<(), ProbeError>;
}

type CheckFn = dyn Fn() -> BoxFuture<'static, Result<(), ProbeError>> + Send + Sync;

/// Adapts any fallible async operation into a [`Probe`].
pub struct FnProbe {
    name: String,
    retry: RetryConfig,
    check: Box<CheckFn>,
}

impl FnProbe {
    pub fn new<F, Fut>(name: impl Into<String>, retry: RetryConfig, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), ProbeError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            retry,
            check: Box::new(move || Box::pin(f())),
        }
    }
}

impl fmt::Debug for FnProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProbe")
            .field("name", &self.name)
            .field("retry", &self.retry)
            .finish()
    }
}

#[async_trait]
impl Probe for FnProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    async fn check(&self) -> Result<(), ProbeError> {
        (self.check)().await
    }
}

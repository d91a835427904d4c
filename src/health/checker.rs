// src/health/checker.rs
use super::{Endpoint, HttpExpectation, Probe, ProbeError, Target};
use crate::config::RetryConfig;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;
use url::Url;

/// Perform exactly one readiness attempt against `endpoint`.
///
/// The whole attempt (connect, response, body) is bounded by the
/// endpoint's timeout. Elapsing it yields `ProbeError::Timeout`; anything
/// that answered but not as expected yields `ProbeError::Unexpected`.
pub async fn check(client: &Client, endpoint: &Endpoint) -> Result<(), ProbeError> {
    let limit = endpoint.timeout();
    let timed_out = || ProbeError::Timeout {
        timeout_ms: limit.as_millis() as u64,
    };

    match endpoint.target() {
        Target::Http { url, expect } => timeout(limit, check_http(client, url, expect, limit))
            .await
            .unwrap_or_else(|_| Err(timed_out())),
        Target::Tcp { address } => match timeout(limit, TcpStream::connect(address.as_str())).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(ProbeError::Connection(e.to_string())),
            Err(_) => Err(timed_out()),
        },
    }
}

async fn check_http(
    client: &Client,
    url: &Url,
    expect: &HttpExpectation,
    limit: Duration,
) -> Result<(), ProbeError> {
    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| classify_request_error(e, limit))?;
    let status = response.status();

    match expect {
        HttpExpectation::Status(accepted) => {
            if accepted.contains(&status.as_u16()) {
                Ok(())
            } else {
                Err(ProbeError::Unexpected(format!(
                    "HTTP {}, expected one of {:?}",
                    status.as_u16(),
                    accepted
                )))
            }
        }
        HttpExpectation::JsonEquals { path, value } => {
            if !status.is_success() {
                return Err(ProbeError::Unexpected(format!("HTTP {}", status.as_u16())));
            }
            let body: serde_json::Value = response
                .json()
                .await
                .map_err(|e| ProbeError::Unexpected(format!("malformed JSON body: {e}")))?;

            match path.lookup(&body) {
                Some(found) if found == value => Ok(()),
                Some(found) => Err(ProbeError::Unexpected(format!(
                    "{path} is {found}, expected {value}"
                ))),
                None => Err(ProbeError::Unexpected(format!("{path} not present"))),
            }
        }
    }
}

/// A client-side timeout is reported against the endpoint's own limit.
fn classify_request_error(error: reqwest::Error, limit: Duration) -> ProbeError {
    if error.is_timeout() {
        ProbeError::Timeout {
            timeout_ms: limit.as_millis() as u64,
        }
    } else {
        ProbeError::Connection(error.to_string())
    }
}

/// A named network probe with its own retry budget.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    name: String,
    endpoint: Endpoint,
    retry: RetryConfig,
    client: Client,
}

impl HealthProbe {
    pub fn new(name: impl Into<String>, endpoint: Endpoint, retry: RetryConfig, client: Client) -> Self {
        Self {
            name: name.into(),
            endpoint,
            retry,
            client,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[async_trait]
impl Probe for HealthProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    async fn check(&self) -> Result<(), ProbeError> {
        let result = check(&self.client, &self.endpoint).await;
        debug!(probe = %self.name, endpoint = %self.endpoint, ?result, "probe attempt");
        result
    }
}

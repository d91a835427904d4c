// src/health/endpoint.rs
use super::JsonPath;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    Http,
    Tcp,
}

/// What an HTTP response must look like to count as ready.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HttpExpectation {
    /// Any of these status codes. Auth-gated UIs commonly list 403 here.
    Status(BTreeSet<u16>),
    /// A 2xx response whose JSON body has `path == value`.
    JsonEquals {
        path: JsonPath,
        value: serde_json::Value,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Http { url: Url, expect: HttpExpectation },
    Tcp { address: String },
}

/// A network location plus the rule that decides whether it is ready.
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Endpoint {
    target: Target,
    #[serde(rename = "timeout_ms", serialize_with = "serialize_millis")]
    timeout: Duration,
}

impl Endpoint {
    pub fn http(url: Url, accepted: impl IntoIterator<Item = u16>, timeout: Duration) -> Self {
        Self {
            target: Target::Http {
                url,
                expect: HttpExpectation::Status(accepted.into_iter().collect()),
            },
            timeout,
        }
    }

    pub fn http_json(url: Url, path: JsonPath, value: serde_json::Value, timeout: Duration) -> Self {
        Self {
            target: Target::Http {
                url,
                expect: HttpExpectation::JsonEquals { path, value },
            },
            timeout,
        }
    }

    pub fn tcp(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            target: Target::Tcp {
                address: address.into(),
            },
            timeout,
        }
    }

    pub fn kind(&self) -> EndpointKind {
        match self.target {
            Target::Http { .. } => EndpointKind::Http,
            Target::Tcp { .. } => EndpointKind::Tcp,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Target::Http { url, .. } => write!(f, "GET {url}"),
            Target::Tcp { address } => write!(f, "tcp://{address}"),
        }
    }
}

fn serialize_millis<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}

// src/config/models.rs
use super::ConfigError;
use crate::health::{Endpoint, JsonPath};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// A complete bring-up definition: the services to start and the checks to
/// run once they are up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConfig {
    #[serde(default)]
    pub settings: Settings,
    pub units: Vec<UnitConfig>,
    #[serde(default)]
    pub checks: Vec<CheckConfig>,
}

impl PlanConfig {
    /// Structural validation. Dependency ordering is checked when the
    /// `DependencyPlan` is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.units.is_empty() && self.checks.is_empty() {
            return Err(ConfigError::Invalid(
                "plan defines no units and no checks".into(),
            ));
        }

        let mut ids = HashSet::new();
        let mut unit_keys = HashMap::new();
        for unit in &self.units {
            unit.validate()?;
            if !ids.insert(unit.id.as_str()) {
                return Err(ConfigError::DuplicateUnit(unit.id.clone()));
            }
            reserve_key(&mut unit_keys, "UNIT", &unit.id)?;
        }

        let mut names = HashSet::new();
        let mut check_keys = HashMap::new();
        for check in &self.checks {
            check.validate()?;
            if !names.insert(check.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate check name `{}`",
                    check.name
                )));
            }
            reserve_key(&mut check_keys, "CHECK", &check.name)?;
            for unit in &check.after {
                if !ids.contains(unit.as_str()) {
                    return Err(ConfigError::UnknownDependency {
                        unit: format!("check:{}", check.name),
                        dependency: unit.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Stable fingerprint of the units and checks, used to decide whether a
    /// previously persisted report still describes this plan.
    pub fn digest(&self) -> String {
        // Settings are excluded: changing the report path does not change
        // what "ready" means.
        let canonical = serde_json::to_string(&(&self.units, &self.checks)).unwrap_or_default();
        format!("{:016x}", fnv1a(canonical.as_bytes()))
    }
}

/// Status artifact key for a unit id or check name: `sonar-qube.api` ->
/// `SONAR_QUBE_API`.
pub fn env_key(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Two names that render to the same artifact line would shadow each other
/// when the artifact is sourced.
fn reserve_key<'a>(
    taken: &mut HashMap<String, &'a str>,
    prefix: &str,
    name: &'a str,
) -> Result<(), ConfigError> {
    let key = format!("{prefix}_{}", env_key(name));
    match taken.get(&key) {
        Some(other) => Err(ConfigError::Invalid(format!(
            "`{other}` and `{name}` both map to status key {key}"
        ))),
        None => {
            taken.insert(key, name);
            Ok(())
        }
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(PRIME))
}

/// Run-level settings, layered by `load_settings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub report_path: PathBuf,
    pub json_report_path: Option<PathBuf>,
    pub metrics_path: Option<PathBuf>,
    pub policy: FailurePolicy,
    pub deadline_secs: Option<u64>,
    pub concurrent_probes: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            report_path: PathBuf::from("bringup-status.env"),
            json_report_path: None,
            metrics_path: None,
            policy: FailurePolicy::Abort,
            deadline_secs: None,
            concurrent_probes: true,
        }
    }
}

impl Settings {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

/// What the orchestrator does with the rest of the plan once a unit fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop processing further units.
    #[default]
    Abort,
    /// Record the failure and move on to the next unit.
    Continue,
    /// Re-run the unit's start action once; abort if it still fails.
    RestartOnce,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::Abort => "abort",
            FailurePolicy::Continue => "continue",
            FailurePolicy::RestartOnce => "restart-once",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "continue" => Ok(FailurePolicy::Continue),
            "restart-once" | "restartonce" => Ok(FailurePolicy::RestartOnce),
            other => Err(ConfigError::Invalid(format!(
                "unknown failure policy `{other}` (expected abort, continue or restart-once)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitConfig {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub start: ActionConfig,
    #[serde(default)]
    pub stop: Option<ActionConfig>,
    #[serde(default)]
    pub probes: Vec<ProbeConfig>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl UnitConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::Invalid("unit id must not be empty".into()));
        }
        self.start.validate(&self.id)?;
        if let Some(stop) = &self.stop {
            stop.validate(&self.id)?;
        }

        let mut names = HashSet::new();
        for probe in &self.probes {
            if !names.insert(probe.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "unit `{}` has duplicate probe `{}`",
                    self.id, probe.name
                )));
            }
            probe.retry.validate()?;
            probe.endpoint.to_endpoint()?;
        }
        Ok(())
    }
}

/// A shell command used to start or stop a service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    pub command: String,
    #[serde(default)]
    pub workdir: Option<PathBuf>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ActionConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    fn validate(&self, unit: &str) -> Result<(), ConfigError> {
        if self.command.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "unit `{unit}` has an empty command"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub name: String,
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EndpointConfig {
    Http {
        url: Url,
        #[serde(default)]
        expect_status: Option<Vec<u16>>,
        #[serde(default)]
        expect_json: Option<JsonExpectationConfig>,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
    Tcp {
        address: String,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonExpectationConfig {
    pub path: String,
    pub equals: serde_json::Value,
}

fn default_timeout_ms() -> u64 {
    5_000
}

impl EndpointConfig {
    pub fn to_endpoint(&self) -> Result<Endpoint, ConfigError> {
        match self {
            EndpointConfig::Http {
                url,
                expect_status,
                expect_json,
                timeout_ms,
            } => {
                let timeout = Duration::from_millis(*timeout_ms);
                match (expect_status, expect_json) {
                    (Some(_), Some(_)) => Err(ConfigError::Invalid(format!(
                        "endpoint {url}: expect_status and expect_json are mutually exclusive"
                    ))),
                    (_, Some(json)) => {
                        let path: JsonPath = json
                            .path
                            .parse()
                            .map_err(|e| ConfigError::Invalid(format!("endpoint {url}: {e}")))?;
                        Ok(Endpoint::http_json(url.clone(), path, json.equals.clone(), timeout))
                    }
                    (Some(codes), None) if codes.is_empty() => Err(ConfigError::Invalid(
                        format!("endpoint {url}: expect_status must not be empty"),
                    )),
                    (Some(codes), None) => {
                        Ok(Endpoint::http(url.clone(), codes.iter().copied(), timeout))
                    }
                    (None, None) => Ok(Endpoint::http(url.clone(), [200], timeout)),
                }
            }
            EndpointConfig::Tcp {
                address,
                timeout_ms,
            } => {
                if !address.contains(':') {
                    return Err(ConfigError::Invalid(format!(
                        "tcp address `{address}` must be host:port"
                    )));
                }
                Ok(Endpoint::tcp(address.clone(), Duration::from_millis(*timeout_ms)))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Constant delay of `interval_ms` between attempts.
    #[default]
    Fixed,
    /// `interval_ms * 2^(n-1)`, capped at `max_interval_ms`.
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub interval_ms: u64,
    pub backoff: BackoffKind,
    pub max_interval_ms: Option<u64>,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval_ms: 10_000,
            backoff: BackoffKind::Fixed,
            max_interval_ms: None,
            jitter: false,
        }
    }
}

impl RetryConfig {
    pub fn fixed(max_attempts: u32, interval_ms: u64) -> Self {
        Self {
            max_attempts,
            interval_ms,
            ..Self::default()
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn max_interval(&self) -> Option<Duration> {
        self.max_interval_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".into()));
        }
        if let Some(max) = self.max_interval_ms {
            if max < self.interval_ms {
                return Err(ConfigError::Invalid(format!(
                    "max_interval_ms ({max}) is below interval_ms ({})",
                    self.interval_ms
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    pub name: String,
    pub target: CheckTarget,
    #[serde(default)]
    pub severity: Severity,
    /// Units that must have settled before the check runs. A check whose
    /// unit did not become ready is reported as a warning instead of run.
    #[serde(default)]
    pub after: Vec<String>,
}

impl CheckConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("check name must not be empty".into()));
        }
        if let CheckTarget::Endpoint(endpoint) = &self.target {
            endpoint.to_endpoint()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckTarget {
    Endpoint(EndpointConfig),
    File(PathBuf),
    Tool(String),
}

/// How a failing check is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Fail,
    Warn,
}

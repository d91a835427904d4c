// src/report/artifact.rs
use super::Report;
use crate::config::env_key;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: expected KEY=VALUE")]
    Malformed { path: PathBuf, line: usize },

    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Replace `path` with `contents`: write a sibling temp file, then rename it
/// over the target so readers see the old file or the new one, never a mix.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ReportError> {
    let write_err = |source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&dir).await.map_err(write_err)?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    let temp = dir.join(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));

    if let Err(source) = tokio::fs::write(&temp, contents).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(write_err(source));
    }
    if let Err(source) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(write_err(source));
    }
    Ok(())
}

/// Render the report as `KEY=VALUE` lines that a shell can `source`.
pub fn render_artifact(report: &Report) -> String {
    let mut lines = vec![
        ("TIMESTAMP".to_string(), report.timestamp.to_rfc3339()),
        ("RUN_ID".to_string(), report.run_id.to_string()),
    ];
    if let Some(digest) = &report.plan_digest {
        lines.push(("PLAN_DIGEST".to_string(), digest.clone()));
    }
    if let Some(policy) = report.policy {
        lines.push(("POLICY".to_string(), policy.to_string()));
    }

    let summary = &report.summary;
    lines.push(("PASS_COUNT".to_string(), summary.pass_count.to_string()));
    lines.push(("FAIL_COUNT".to_string(), summary.fail_count.to_string()));
    lines.push(("WARN_COUNT".to_string(), summary.warn_count.to_string()));
    lines.push(("READY".to_string(), report.ready().to_string()));

    let join_ids = |units: Vec<&str>| units.join(",");
    lines.push((
        "UNITS_READY".to_string(),
        join_ids(report.units_ready().map(|u| u.unit_id.as_str()).collect()),
    ));
    lines.push((
        "UNITS_FAILED".to_string(),
        join_ids(report.units_failed().map(|u| u.unit_id.as_str()).collect()),
    ));

    for unit in &report.unit_results {
        let status = if unit.ready {
            "READY"
        } else if unit.failed() {
            "FAILED"
        } else {
            "SKIPPED"
        };
        lines.push((format!("UNIT_{}", env_key(&unit.unit_id)), status.to_string()));
    }
    for check in &report.check_results {
        lines.push((
            format!("CHECK_{}", env_key(&check.check_name)),
            check.status.to_string(),
        ));
    }

    let mut out = String::new();
    for (key, value) in lines {
        out.push_str(&key);
        out.push('=');
        out.push_str(&quote(&value));
        out.push('\n');
    }
    out
}

pub async fn write_artifact(report: &Report, path: &Path) -> Result<(), ReportError> {
    write_atomic(path, render_artifact(report).as_bytes()).await?;
    info!(path = %path.display(), ready = report.ready(), "status artifact written");
    Ok(())
}

/// Full report, including attempt records, as pretty JSON.
pub async fn write_json(report: &Report, path: &Path) -> Result<(), ReportError> {
    let json = serde_json::to_vec_pretty(report)?;
    write_atomic(path, &json).await
}

/// A previously written status artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifact {
    entries: BTreeMap<String, String>,
}

impl Artifact {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn ready(&self) -> bool {
        self.get("READY") == Some("true")
    }

    pub fn plan_digest(&self) -> Option<&str> {
        self.get("PLAN_DIGEST")
    }

    pub fn count(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|value| value.parse().ok())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

pub async fn load_artifact(path: &Path) -> Result<Artifact, ReportError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ReportError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    parse_artifact(path, &contents)
}

fn parse_artifact(path: &Path, contents: &str) -> Result<Artifact, ReportError> {
    let mut entries = BTreeMap::new();
    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| ReportError::Malformed {
            path: path.to_path_buf(),
            line: number + 1,
        })?;
        entries.insert(key.trim().to_string(), unquote(value.trim()));
    }
    Ok(Artifact { entries })
}

fn quote(value: &str) -> String {
    let plain = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_.,:+/@".contains(c));
    if plain {
        return value.to_string();
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

fn unquote(value: &str) -> String {
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return value.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

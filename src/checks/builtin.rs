// src/checks/builtin.rs
use super::Check;
use crate::health::{self, Endpoint};
use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};

/// Reachability of an HTTP or TCP endpoint, judged by a single attempt.
#[derive(Debug, Clone)]
pub struct EndpointCheck {
    name: String,
    endpoint: Endpoint,
    client: Client,
}

impl EndpointCheck {
    pub fn new(name: impl Into<String>, endpoint: Endpoint, client: Client) -> Self {
        Self {
            name: name.into(),
            endpoint,
            client,
        }
    }
}

#[async_trait]
impl Check for EndpointCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> anyhow::Result<String> {
        health::check(&self.client, &self.endpoint)
            .await
            .with_context(|| format!("{} unreachable", self.endpoint))?;
        Ok(format!("{} reachable", self.endpoint))
    }
}

/// A prerequisite file or directory exists.
#[derive(Debug, Clone)]
pub struct FileCheck {
    name: String,
    path: PathBuf,
}

impl FileCheck {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

#[async_trait]
impl Check for FileCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> anyhow::Result<String> {
        tokio::fs::metadata(&self.path)
            .await
            .with_context(|| format!("{} not found", self.path.display()))?;
        Ok(format!("{} present", self.path.display()))
    }
}

/// A command-line tool can be resolved on `PATH`.
#[derive(Debug, Clone)]
pub struct ToolCheck {
    name: String,
    tool: String,
}

impl ToolCheck {
    pub fn new(name: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tool: tool.into(),
        }
    }
}

#[async_trait]
impl Check for ToolCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> anyhow::Result<String> {
        match find_executable(&self.tool) {
            Some(path) => Ok(format!("{} at {}", self.tool, path.display())),
            None => bail!("{} not found on PATH", self.tool),
        }
    }
}

fn find_executable(tool: &str) -> Option<PathBuf> {
    if tool.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(tool);
        return is_executable(&path).then_some(path);
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(tool))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

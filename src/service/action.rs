// src/service/action.rs
use crate::config::ActionConfig;
use async_trait::async_trait;
use serde::Serialize;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

/// Bytes of stderr kept when a command fails.
const STDERR_TAIL: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StartActionError {
    #[error("`{command}` exited with {}: {stderr}", exit_code(.code))]
    Exit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to spawn `{command}`: {reason}")]
    Spawn { command: String, reason: String },

    #[error("`{command}` did not finish within {secs}s")]
    Timeout { command: String, secs: u64 },

    #[error("{0}")]
    Failed(String),
}

/// Lifecycle hooks for one service. `start` returns once the service has
/// been launched, which is not the same as ready.
#[async_trait]
pub trait StartAction: Send + Sync {
    async fn start(&self) -> Result<(), StartActionError>;

    async fn stop(&self) -> Result<(), StartActionError> {
        Ok(())
    }
}

/// Start and stop a service with shell commands (`sh -c`).
#[derive(Debug, Clone)]
pub struct CommandAction {
    start: ActionConfig,
    stop: Option<ActionConfig>,
}

impl CommandAction {
    pub fn new(start: ActionConfig, stop: Option<ActionConfig>) -> Self {
        Self { start, stop }
    }
}

#[async_trait]
impl StartAction for CommandAction {
    async fn start(&self) -> Result<(), StartActionError> {
        run_command(&self.start).await
    }

    async fn stop(&self) -> Result<(), StartActionError> {
        match &self.stop {
            Some(stop) => run_command(stop).await,
            None => Ok(()),
        }
    }
}

async fn run_command(action: &ActionConfig) -> Result<(), StartActionError> {
    info!(command = %action.command, "running");

    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(&action.command)
        .envs(&action.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &action.workdir {
        command.current_dir(dir);
    }

    let output = command.output();
    let output = match action.timeout() {
        Some(limit) => timeout(limit, output)
            .await
            .map_err(|_| StartActionError::Timeout {
                command: action.command.clone(),
                secs: limit.as_secs(),
            })?,
        None => output.await,
    }
    .map_err(|e| StartActionError::Spawn {
        command: action.command.clone(),
        reason: e.to_string(),
    })?;

    debug!(
        command = %action.command,
        status = %output.status,
        stdout = %String::from_utf8_lossy(&output.stdout).trim_end(),
        "command finished"
    );

    if output.status.success() {
        Ok(())
    } else {
        Err(StartActionError::Exit {
            command: action.command.clone(),
            code: output.status.code(),
            stderr: tail(&output.stderr),
        })
    }
}

fn exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "signal".to_string(),
    }
}

fn tail(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    let start = text
        .char_indices()
        .map(|(i, _)| i)
        .find(|i| text.len() - i <= STDERR_TAIL)
        .unwrap_or(text.len());
    text[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn action(command: &str) -> ActionConfig {
        ActionConfig {
            command: command.into(),
            workdir: None,
            env: BTreeMap::new(),
            timeout_secs: None,
        }
    }

    #[tokio::test]
    async fn test_successful_command() {
        let action = CommandAction::new(action("exit 0"), None);
        assert_eq!(action.start().await, Ok(()));
        assert_eq!(action.stop().await, Ok(()));
    }

    #[tokio::test]
    async fn test_failing_command_captures_stderr() {
        let action = CommandAction::new(action("echo 'no such container' >&2; exit 3"), None);
        let err = action.start().await.unwrap_err();
        match err {
            StartActionError::Exit { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "no such container");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_env_is_passed_explicitly() {
        let mut config = action("test \"$ADMIN_USER\" = admin");
        config.env.insert("ADMIN_USER".into(), "admin".into());
        assert_eq!(CommandAction::new(config, None).start().await, Ok(()));
    }

    #[tokio::test]
    async fn test_command_timeout() {
        let mut config = action("sleep 5");
        config.timeout_secs = Some(1);
        let started = std::time::Instant::now();
        let err = CommandAction::new(config, None).start().await.unwrap_err();
        assert!(matches!(err, StartActionError::Timeout { secs: 1, .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_stop_command_runs() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("stopped");
        let stop = action(&format!("touch {}", marker.display()));
        CommandAction::new(action("true"), Some(stop)).stop().await.unwrap();
        assert!(marker.exists());
    }

    #[test]
    fn test_tail_keeps_end() {
        let long = "x".repeat(2 * STDERR_TAIL) + "last line";
        let kept = tail(long.as_bytes());
        assert!(kept.len() <= STDERR_TAIL);
        assert!(kept.ends_with("last line"));
    }
}

//! Shell command action - runs `sh -c <command>` with a timeout.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::{Action, ActionOutcome};
use crate::error::{AutoloopError, Result};

/// Configuration for a command action
#[derive(Debug, Clone)]
pub struct CommandActionConfig {
    /// The command to execute
    pub command: String,
    /// Environment variables to set
    pub env: Vec<(String, String)>,
    /// Working directory (None = inherit)
    pub working_dir: Option<PathBuf>,
    /// Timeout in milliseconds (default: 30000)
    pub timeout_ms: u64,
    /// Impact reported when the command succeeds
    pub impact: f64,
}

impl Default for CommandActionConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            env: Vec::new(),
            working_dir: None,
            timeout_ms: 30000,
            impact: 0.5,
        }
    }
}

impl CommandActionConfig {
    /// Create a new command config with the given command
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    /// Add an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the timeout in milliseconds
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Set the impact reported on success
    pub fn impact(mut self, impact: f64) -> Self {
        self.impact = impact;
        self
    }

    /// Set the working directory
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// Action that succeeds when its shell command exits 0
pub struct CommandAction {
    kind: String,
    config: CommandActionConfig,
}

impl CommandAction {
    pub fn new(kind: impl Into<String>, config: CommandActionConfig) -> Self {
        Self {
            kind: kind.into(),
            config,
        }
    }

    /// Create a command action with defaults
    pub fn simple(kind: impl Into<String>, command: impl Into<String>) -> Self {
        Self::new(kind, CommandActionConfig::new(command))
    }

    /// Get the command
    pub fn command(&self) -> &str {
        &self.config.command
    }

    async fn spawn(&self) -> std::io::Result<std::process::Output> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&self.config.command);
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);

        let child = cmd.spawn()?;

        let timeout = Duration::from_millis(self.config.timeout_ms);
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result,
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("Command timed out after {}ms", self.config.timeout_ms),
            )),
        }
    }
}

#[async_trait]
impl Action for CommandAction {
    fn kind(&self) -> &str {
        &self.kind
    }

    async fn run(&self) -> Result<ActionOutcome> {
        log::debug!("Running action '{}': {}", self.kind, self.config.command);
        let output = self
            .spawn()
            .await
            .map_err(|e| AutoloopError::ActionExecution(format!("'{}': {}", self.kind, e)))?;

        if output.status.success() {
            return Ok(ActionOutcome::success(self.config.impact));
        }

        let mut detail = format!("'{}' exited with code {:?}", self.kind, output.status.code());
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            detail.push_str(&format!(": {}", stderr.trim()));
        }
        Ok(ActionOutcome::failure(detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = CommandActionConfig::new("echo hi")
            .env("A", "1")
            .timeout_ms(500)
            .impact(0.9)
            .working_dir("/tmp");
        assert_eq!(config.command, "echo hi");
        assert_eq!(config.env, vec![("A".to_string(), "1".to_string())]);
        assert_eq!(config.timeout_ms, 500);
        assert_eq!(config.impact, 0.9);
        assert_eq!(config.working_dir, Some(PathBuf::from("/tmp")));
    }

    #[tokio::test]
    async fn test_successful_command() {
        let action = CommandAction::new("routine_maintenance", CommandActionConfig::new("true").impact(0.4));
        let outcome = action.run().await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.impact, 0.4);
    }

    #[tokio::test]
    async fn test_failing_command_reports_stderr() {
        let action = CommandAction::simple("exploration", "echo oops >&2; exit 3");
        let outcome = action.run().await.unwrap();
        assert!(!outcome.success);
        let detail = outcome.detail.unwrap();
        assert!(detail.contains("Some(3)"));
        assert!(detail.contains("oops"));
    }

    #[tokio::test]
    async fn test_env_passed_to_command() {
        let config = CommandActionConfig::new("test \"$MODE\" = fast").env("MODE", "fast");
        let outcome = CommandAction::new("performance_optimization", config).run().await.unwrap();
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn test_timeout_is_error() {
        let config = CommandActionConfig::new("sleep 5").timeout_ms(100);
        let err = CommandAction::new("slow", config).run().await.unwrap_err();
        assert!(matches!(err, AutoloopError::ActionExecution(_)));
        assert!(err.to_string().contains("timed out"));
    }
}

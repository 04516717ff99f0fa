//! Local transport
//!
//! Runs commands on the control node through `sh -c`. The host name given to
//! `connect` is only recorded for diagnostics, so every "host" shares the
//! local machine.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, trace};

use super::{CommandResult, ConnectionError, ConnectionResult, LogLevel, Transport};

/// Transport executing commands on the current host
#[derive(Debug, Clone, Default)]
pub struct LocalTransport {
    /// Host name of the current "session"
    session: Option<String>,
    /// Per-command timeout
    command_timeout: Option<Duration>,
    log_level: LogLevel,
}

impl LocalTransport {
    /// Create a new local transport
    pub fn new(command_timeout: Option<Duration>) -> Self {
        Self {
            session: None,
            command_timeout,
            log_level: LogLevel::default(),
        }
    }

    fn build_command(command: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Transport for LocalTransport {
    fn name(&self) -> &str {
        "local"
    }

    async fn connect(&mut self, host: &str, _verify_identity: bool) -> ConnectionResult<()> {
        if self.log_level.allows(LogLevel::Debug) {
            debug!(host = %host, "Opening local session");
        }
        self.session = Some(host.to_string());
        Ok(())
    }

    async fn execute(&mut self, command: &str) -> ConnectionResult<CommandResult> {
        let host = self.session.as_deref().ok_or(ConnectionError::NotConnected)?;
        if self.log_level.allows(LogLevel::Debug) {
            debug!(host = %host, command = %command, "Executing local command");
        }

        let child = Self::build_command(command).spawn().map_err(|e| {
            ConnectionError::ExecutionFailed(format!("Failed to spawn process: {}", e))
        })?;

        let output = match self.command_timeout {
            Some(timeout) => tokio::time::timeout(timeout, child.wait_with_output())
                .await
                .map_err(|_| ConnectionError::Timeout(timeout.as_secs()))??,
            None => child.wait_with_output().await?,
        };

        // A process killed by a signal has no exit code
        let exit_code = output.status.code().unwrap_or(-1);
        trace!(exit_code = %exit_code, "Local command completed");

        Ok(CommandResult::from_exit_code(
            exit_code,
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
        ))
    }

    async fn close(&mut self) -> ConnectionResult<()> {
        self.session = None;
        Ok(())
    }

    fn set_log_level(&mut self, level: LogLevel) {
        self.log_level = level;
    }

    fn renew(&self) -> Box<dyn Transport> {
        let mut fresh = LocalTransport::new(self.command_timeout);
        fresh.log_level = self.log_level;
        Box::new(fresh)
    }
}

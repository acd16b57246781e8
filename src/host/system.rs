//! Subprocess-backed host runner

use crate::host::{CommandError, CommandOutput, HostCommand, HostRunner};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs host commands as real subprocesses
#[derive(Debug, Clone)]
pub struct SystemRunner {
    /// Timeout for command execution in seconds
    timeout_secs: u64,
}

impl Default for SystemRunner {
    fn default() -> Self {
        // apt-get on a fresh host can take a while
        Self { timeout_secs: 1800 }
    }
}

impl SystemRunner {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    /// Get the configured timeout
    #[cfg(test)]
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    fn build(&self, command: &HostCommand) -> Command {
        let argv = command.argv();
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if command.stdin.is_some() {
            cmd.stdin(Stdio::piped());
        } else {
            cmd.stdin(Stdio::null());
        }

        cmd
    }
}

#[async_trait]
impl HostRunner for SystemRunner {
    async fn run(&self, command: &HostCommand) -> Result<CommandOutput, CommandError> {
        let line = command.display();
        debug!("Running: {}", line);

        let mut child = self.build(command).spawn().map_err(|e| CommandError::Spawn {
            command: line.clone(),
            reason: e.to_string(),
        })?;

        if let Some(text) = &command.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(text.as_bytes())
                    .await
                    .map_err(|e| CommandError::Input {
                        command: line.clone(),
                        reason: e.to_string(),
                    })?;
                // Dropping closes the pipe so the child sees EOF
            }
        }

        let output = timeout(
            Duration::from_secs(self.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| CommandError::Timeout {
            command: line.clone(),
            secs: self.timeout_secs,
        })?
        .map_err(|e| CommandError::Spawn {
            command: line.clone(),
            reason: e.to_string(),
        })?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if result.success() {
            debug!("{} returned {} bytes of output", line, result.stdout.len());
        } else {
            warn!(
                "{} exited with code {}: {}",
                line,
                result.code.unwrap_or(-1),
                result.stderr.trim()
            );
        }

        Ok(result)
    }
}

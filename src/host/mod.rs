//! Host command execution
//!
//! Every side effect the provisioner and launcher have on the machine goes
//! through [`HostRunner`], so stages can be exercised against a scripted
//! runner in tests.

pub mod command;
pub mod error;
pub mod system;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
pub use command::{CommandOutput, Escalation, HostCommand};
pub use error::CommandError;
pub use system::SystemRunner;

/// Trait for running commands on the host - allows for different implementations
#[async_trait]
pub trait HostRunner: Send + Sync {
    /// Run a command and capture its output, whatever its exit status
    async fn run(&self, command: &HostCommand) -> Result<CommandOutput, CommandError>;

    /// Run a command and treat a nonzero exit as an error
    async fn run_checked(&self, command: &HostCommand) -> Result<CommandOutput, CommandError> {
        let output = self.run(command).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(CommandError::Failed {
                command: command.display(),
                code: output.code.unwrap_or(-1),
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    /// Run a command used as a predicate (`test -f`, `pip check`, ...)
    async fn succeeds(&self, command: &HostCommand) -> Result<bool, CommandError> {
        Ok(self.run(command).await?.success())
    }
}

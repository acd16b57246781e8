//! Host command error types

use thiserror::Error;

/// Error types for host command execution
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn `{command}`: {reason}")]
    Spawn { command: String, reason: String },

    #[error("`{command}` exited with code {code}: {stderr}")]
    Failed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("`{command}` timed out after {secs} seconds")]
    Timeout { command: String, secs: u64 },

    #[error("cannot feed input to `{command}`: {reason}")]
    Input { command: String, reason: String },
}

//! cabinet-deploy - provision a host for the drone cabinet service and launch it

pub mod cli;
pub mod core;
pub mod execution;
pub mod host;
pub mod launcher;
pub mod provision;

// Re-export commonly used types
pub use core::{ExecutionStatus, Idempotency, Pipeline, Stage, StageOutcome, StageState};
pub use execution::{ExecutionEngine, ExecutionEvent, ProvisionError};
pub use host::{HostCommand, HostRunner, SystemRunner};
pub use launcher::{LaunchError, LaunchPhase, Launcher, LauncherSettings, PreflightFailure};

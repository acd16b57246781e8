//! Launcher error types

use std::path::PathBuf;
use thiserror::Error;

/// A fatal preflight check that did not pass
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreflightFailure {
    #[error("virtual environment not found at {}; run `cabinetctl provision` again", venv.display())]
    EnvironmentMissing { venv: PathBuf },

    #[error("runtime config not found at {}", path.display())]
    ConfigMissing { path: PathBuf },

    #[error("runtime config {} cannot be loaded: {reason}", path.display())]
    ConfigUnreadable { path: PathBuf, reason: String },

    #[error("dependent service {target} is unreachable: {reason}")]
    DependentServiceUnreachable { target: String, reason: String },
}

impl PreflightFailure {
    /// Process exit code reported for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            PreflightFailure::EnvironmentMissing { .. } => 10,
            PreflightFailure::ConfigMissing { .. } => 11,
            PreflightFailure::ConfigUnreadable { .. } => 12,
            PreflightFailure::DependentServiceUnreachable { .. } => 13,
        }
    }
}

/// A non-fatal finding; logged, never blocks the start
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PreflightWarning {
    #[error("dependency check failed: {0}")]
    DependencyCheck(String),

    #[error("dependency reinstall failed: {0}")]
    DependencyRepair(String),

    #[error("runtime config has issues: {}", .0.join("; "))]
    ConfigSelfValidation(Vec<String>),

    #[error("cannot prepare {}: {reason}", path.display())]
    DirectoryPrep { path: PathBuf, reason: String },
}

/// Why a launch ended unsuccessfully
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(transparent)]
    Preflight(#[from] PreflightFailure),

    #[error("failed to start application: {0}")]
    Start(String),

    #[error("application exited with code {0}")]
    AppExited(i32),
}

impl LaunchError {
    /// Process exit code reported for this error
    ///
    /// The application's own exit code is passed through unchanged, so an
    /// application exiting with 10 to 14 shares a code with a preflight or
    /// start failure. The logged error tells them apart.
    pub fn exit_code(&self) -> i32 {
        match self {
            LaunchError::Preflight(failure) => failure.exit_code(),
            LaunchError::Start(_) => 14,
            LaunchError::AppExited(code) => *code,
        }
    }
}

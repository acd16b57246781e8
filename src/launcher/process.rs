//! Application process start and supervision

use crate::launcher::error::LaunchError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::{info, warn};

/// Everything needed to start the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Added to the launcher's own environment
    pub env: Vec<(String, String)>,
}

impl LaunchSpec {
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// How a supervised application ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppExit {
    /// Stopped on request after a termination signal
    Stopped,
    /// Exited by itself with this code
    Exited(i32),
}

/// Starts the application; the seam tests replace
#[async_trait]
pub trait AppStarter: Send + Sync {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<Box<dyn AppHandle>, LaunchError>;
}

/// A started application the launcher waits on
#[async_trait]
pub trait AppHandle: Send {
    fn id(&self) -> Option<u32>;

    /// Wait until the application ends, forwarding termination signals
    async fn supervise(self: Box<Self>) -> Result<AppExit, LaunchError>;
}

/// Spawns the application as a child process
#[derive(Debug, Default, Clone)]
pub struct ChildSupervisor;

impl ChildSupervisor {
    /// Spawn with signal listeners installed first, so no signal slips by
    pub fn spawn_child(&self, spec: &LaunchSpec) -> Result<SupervisedChild, LaunchError> {
        let signal_error = |e: std::io::Error| LaunchError::Start(format!("cannot listen for signals: {}", e));
        let terminate = signal(SignalKind::terminate()).map_err(signal_error)?;
        let interrupt = signal(SignalKind::interrupt()).map_err(signal_error)?;

        let child = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LaunchError::Start(format!("{}: {}", spec.program, e)))?;

        info!(
            "Started {} (pid {})",
            spec.program,
            child.id().map(|p| p.to_string()).unwrap_or_else(|| "?".to_string())
        );

        Ok(SupervisedChild {
            child,
            terminate,
            interrupt,
        })
    }
}

#[async_trait]
impl AppStarter for ChildSupervisor {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<Box<dyn AppHandle>, LaunchError> {
        Ok(Box::new(self.spawn_child(spec)?))
    }
}

/// A running child plus the signal streams that stop it
pub struct SupervisedChild {
    child: Child,
    terminate: Signal,
    interrupt: Signal,
}

impl SupervisedChild {
    /// Send SIGTERM to the child and wait for it to go away
    pub async fn stop(mut self) -> Result<AppExit, LaunchError> {
        if let Some(pid) = self.child.id() {
            // SAFETY: kill(2) with a pid we spawned and have not yet reaped
            let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
            if rc != 0 {
                warn!(
                    "Forwarding SIGTERM to {} failed: {}",
                    pid,
                    std::io::Error::last_os_error()
                );
            }
        }

        let status = self
            .child
            .wait()
            .await
            .map_err(|e| LaunchError::Start(format!("lost track of application: {}", e)))?;
        info!("Application stopped ({})", status);
        Ok(AppExit::Stopped)
    }
}

#[async_trait]
impl AppHandle for SupervisedChild {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn supervise(mut self: Box<Self>) -> Result<AppExit, LaunchError> {
        let received = tokio::select! {
            status = self.child.wait() => {
                let status = status
                    .map_err(|e| LaunchError::Start(format!("lost track of application: {}", e)))?;
                // Killed by a signal nobody forwarded: report as a plain failure
                let code = status.code().unwrap_or(1);
                info!("Application exited with code {}", code);
                return Ok(AppExit::Exited(code));
            }
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.interrupt.recv() => "SIGINT",
        };

        info!("Received {}, shutting down application", received);
        (*self).stop().await
    }
}

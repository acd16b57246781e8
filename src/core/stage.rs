//! Stage domain model

use crate::core::{config::ProvisionConfig, state::StageState, template::TemplateError};
use crate::host::{CommandError, HostCommand, HostRunner};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// What happens when a stage is run a second time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Idempotency {
    /// Reads host state only
    NoOp,
    /// Converges on the same state ("ensure exists")
    Idempotent,
    /// Rewrites managed artifacts with freshly rendered content
    Overwrite,
    /// Clobbers state the operator may have changed by hand
    Unsafe,
}

impl Idempotency {
    /// Whether re-running the stage is harmless
    pub fn safe_to_rerun(&self) -> bool {
        !matches!(self, Idempotency::Unsafe)
    }
}

impl fmt::Display for Idempotency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Idempotency::NoOp => "no-op",
            Idempotency::Idempotent => "idempotent",
            Idempotency::Overwrite => "overwrite",
            Idempotency::Unsafe => "unsafe",
        };
        f.write_str(label)
    }
}

/// Error returned by a stage action
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The stage declined to act on this host
    #[error("{0}")]
    Refused(String),

    /// A post-condition did not hold
    #[error("{0}")]
    Check(String),
}

/// What a completed stage reports back
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    /// Things the operator should know (skipped sub-steps, captured status)
    pub notes: Vec<String>,

    /// Longer human-readable report, printed after the run
    pub report: Option<String>,
}

impl StageOutcome {
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

/// Everything a stage may touch
pub struct StageContext<'a> {
    pub runner: &'a dyn HostRunner,
    pub config: &'a ProvisionConfig,
}

impl<'a> StageContext<'a> {
    pub fn new(runner: &'a dyn HostRunner, config: &'a ProvisionConfig) -> Self {
        Self { runner, config }
    }

    /// Run a command; nonzero exit fails the stage
    pub async fn run(&self, command: HostCommand) -> Result<String, StageError> {
        Ok(self.runner.run_checked(&command).await?.stdout)
    }

    /// Run a predicate command
    pub async fn check(&self, command: HostCommand) -> Result<bool, StageError> {
        Ok(self.runner.succeeds(&command).await?)
    }

    /// Write `contents` to a root-owned path through `sudo tee`
    pub async fn install_file(&self, dest: &str, contents: String) -> Result<(), StageError> {
        self.run(HostCommand::sudo("tee").arg(dest).stdin_text(contents))
            .await
            .map(|_| ())
    }
}

/// The side-effecting part of a stage
#[async_trait]
pub trait StageAction: Send + Sync {
    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutcome, StageError>;
}

/// A single named unit of provisioning work
#[derive(Clone)]
pub struct Stage {
    /// Unique stage name
    pub name: String,

    /// One line on what the stage does, shown by `cabinetctl stages`
    pub description: String,

    /// Re-run contract
    pub idempotency: Idempotency,

    pub action: Arc<dyn StageAction>,

    /// Runtime state
    pub state: StageState,
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("idempotency", &self.idempotency)
            .field("state", &self.state)
            .finish()
    }
}

impl Stage {
    pub fn new<A>(
        name: impl Into<String>,
        description: impl Into<String>,
        idempotency: Idempotency,
        action: A,
    ) -> Self
    where
        A: StageAction + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            idempotency,
            action: Arc::new(action),
            state: StageState::Pending,
        }
    }

    /// Get the outcome if the stage completed
    pub fn outcome(&self) -> Option<&StageOutcome> {
        match &self.state {
            StageState::Completed { outcome, .. } => Some(outcome),
            _ => None,
        }
    }
}

/// A stage that runs a fixed list of commands in order
#[derive(Debug, Clone)]
pub struct CommandStage {
    commands: Vec<HostCommand>,
}

impl CommandStage {
    pub fn new(commands: Vec<HostCommand>) -> Self {
        Self { commands }
    }
}

#[async_trait]
impl StageAction for CommandStage {
    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutcome, StageError> {
        for command in &self.commands {
            ctx.run(command.clone()).await?;
        }
        Ok(StageOutcome::default())
    }
}

//! Pipeline domain model

use crate::core::{
    stage::Stage,
    state::{ExecutionStatus, PipelineState, StageState},
};
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised while assembling a pipeline
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Duplicate stage name: {0}")]
    DuplicateStage(String),

    #[error("Pipeline '{0}' has no stages")]
    Empty(String),
}

/// An ordered, fail-fast sequence of stages
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Stages in declaration order
    stages: Vec<Stage>,

    /// Execution state
    pub state: PipelineState,
}

impl Pipeline {
    /// Build a pipeline; stage names must be unique
    pub fn new(name: impl Into<String>, stages: Vec<Stage>) -> Result<Self, PipelineError> {
        let name = name.into();
        if stages.is_empty() {
            return Err(PipelineError::Empty(name));
        }

        let mut seen = HashSet::new();
        for stage in &stages {
            if !seen.insert(stage.name.as_str()) {
                return Err(PipelineError::DuplicateStage(stage.name.clone()));
            }
        }

        Ok(Pipeline {
            name,
            stages,
            state: PipelineState::new(),
        })
    }

    /// All stages in order
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Get a stage by name
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Get a stage by position
    pub fn stage_at_mut(&mut self, index: usize) -> Option<&mut Stage> {
        self.stages.get_mut(index)
    }

    /// Stage names in execution order
    pub fn execution_order(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Index of the next stage to run, if every stage before it completed
    pub fn next_runnable(&self) -> Option<usize> {
        for (index, stage) in self.stages.iter().enumerate() {
            match stage.state {
                StageState::Completed { .. } => continue,
                StageState::Pending => return Some(index),
                _ => return None,
            }
        }
        None
    }

    /// Check if every stage completed
    pub fn is_complete(&self) -> bool {
        self.stages
            .iter()
            .all(|s| matches!(s.state, StageState::Completed { .. }))
    }

    /// Check if pipeline has failed
    pub fn has_failed(&self) -> bool {
        self.state.status == ExecutionStatus::Failed
    }

    /// The stage that stopped the run, if any
    pub fn failed_stage(&self) -> Option<&Stage> {
        self.stages
            .iter()
            .find(|s| matches!(s.state, StageState::Failed { .. }))
    }

    /// Names of stages that ran, in order
    pub fn executed_stages(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|s| s.state.was_executed())
            .map(|s| s.name.as_str())
            .collect()
    }
}

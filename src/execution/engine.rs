//! Main execution engine - runs a provisioning pipeline stage by stage

use crate::{
    core::{
        config::ProvisionConfig, ExecutionStatus, Idempotency, Pipeline, StageContext,
        StageError, StageOutcome, StageState,
    },
    host::HostRunner,
};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: Uuid,
        pipeline_name: String,
        total_stages: usize,
    },
    StageStarted {
        stage_name: String,
        position: usize,
        total_stages: usize,
        idempotency: Idempotency,
    },
    StageCompleted {
        stage_name: String,
        outcome: StageOutcome,
    },
    StageFailed {
        stage_name: String,
        error: String,
    },
    PipelineCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(&ExecutionEvent) + Send + Sync>;

/// Why a provisioning run stopped
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("stage '{stage}' failed: {source}")]
    StageFailure {
        stage: String,
        #[source]
        source: StageError,
    },

    #[error("pipeline '{0}' has already been run")]
    AlreadyRun(String),
}

impl ProvisionError {
    /// Name of the stage that failed, if a stage failed
    pub fn stage_name(&self) -> Option<&str> {
        match self {
            ProvisionError::StageFailure { stage, .. } => Some(stage),
            ProvisionError::AlreadyRun(_) => None,
        }
    }
}

/// Fail-fast pipeline executor
pub struct ExecutionEngine<R> {
    runner: R,
    config: ProvisionConfig,
    event_handlers: Vec<EventHandler>,
}

impl<R: HostRunner> ExecutionEngine<R> {
    pub fn new(runner: R, config: ProvisionConfig) -> Self {
        Self {
            runner,
            config,
            event_handlers: Vec::new(),
        }
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(&ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    /// The runner stages execute against
    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn emit_event(&self, event: ExecutionEvent) {
        for handler in &self.event_handlers {
            handler(&event);
        }
    }

    /// Execute the entire pipeline
    ///
    /// Stages run strictly in declaration order. The first failure marks
    /// that stage failed, leaves every later stage pending and returns
    /// [`ProvisionError::StageFailure`]. Nothing is rolled back.
    pub async fn execute(&self, pipeline: &mut Pipeline) -> Result<(), ProvisionError> {
        if pipeline.state.status != ExecutionStatus::Pending {
            return Err(ProvisionError::AlreadyRun(pipeline.name.clone()));
        }

        let execution_id = pipeline.state.execution_id;
        let total_stages = pipeline.stages().len();

        info!(
            "Starting pipeline execution: {} ({})",
            pipeline.name, execution_id
        );
        pipeline.state.start(total_stages);
        self.emit_event(ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name: pipeline.name.clone(),
            total_stages,
        });

        while let Some(index) = pipeline.next_runnable() {
            let (stage_name, idempotency, action) = {
                let stage = &pipeline.stages()[index];
                (stage.name.clone(), stage.idempotency, stage.action.clone())
            };

            let started_at = Utc::now();
            if let Some(stage) = pipeline.stage_at_mut(index) {
                stage.state = StageState::Running { started_at };
            }

            info!(
                "[{}/{}] {} ({})",
                index + 1,
                total_stages,
                stage_name,
                idempotency
            );
            self.emit_event(ExecutionEvent::StageStarted {
                stage_name: stage_name.clone(),
                position: index + 1,
                total_stages,
                idempotency,
            });

            let ctx = StageContext::new(&self.runner, &self.config);
            match action.run(&ctx).await {
                Ok(outcome) => {
                    for note in &outcome.notes {
                        info!("{}: {}", stage_name, note);
                    }
                    if let Some(stage) = pipeline.stage_at_mut(index) {
                        stage.state = StageState::Completed {
                            outcome: outcome.clone(),
                            started_at,
                            completed_at: Utc::now(),
                        };
                    }
                    pipeline.state.stage_completed();
                    self.emit_event(ExecutionEvent::StageCompleted {
                        stage_name,
                        outcome,
                    });
                }
                Err(err) => {
                    error!("Stage {} failed: {}", stage_name, err);
                    if let Some(stage) = pipeline.stage_at_mut(index) {
                        stage.state = StageState::Failed {
                            error: err.to_string(),
                            started_at,
                            failed_at: Utc::now(),
                        };
                    }
                    pipeline.state.fail();
                    self.emit_event(ExecutionEvent::StageFailed {
                        stage_name: stage_name.clone(),
                        error: err.to_string(),
                    });
                    self.emit_event(ExecutionEvent::PipelineCompleted {
                        execution_id,
                        status: ExecutionStatus::Failed,
                    });
                    return Err(ProvisionError::StageFailure {
                        stage: stage_name,
                        source: err,
                    });
                }
            }
        }

        pipeline.state.complete();
        info!(
            "Pipeline execution finished: {} - {:?}",
            pipeline.name,
            ExecutionStatus::Completed
        );
        self.emit_event(ExecutionEvent::PipelineCompleted {
            execution_id,
            status: ExecutionStatus::Completed,
        });

        Ok(())
    }
}

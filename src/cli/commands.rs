//! CLI command definitions

use crate::core::{Idempotency, Stage};
use clap::Args;
use serde::Serialize;

/// List provisioning stages
#[derive(Debug, Args, Clone, PartialEq, Eq)]
pub struct StagesCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// One row of `cabinetctl stages`
#[derive(Debug, Clone, Serialize)]
pub struct StageListing {
    pub position: usize,
    pub name: String,
    pub description: String,
    pub idempotency: Idempotency,
    pub safe_to_rerun: bool,
}

impl StageListing {
    pub fn from_stages(stages: &[Stage]) -> Vec<Self> {
        stages
            .iter()
            .enumerate()
            .map(|(index, stage)| StageListing {
                position: index + 1,
                name: stage.name.clone(),
                description: stage.description.clone(),
                idempotency: stage.idempotency,
                safe_to_rerun: stage.idempotency.safe_to_rerun(),
            })
            .collect()
    }
}

//! The standard provisioning pipeline
//!
//! Twelve stages, declared in the order they run. The order is part of the
//! contract: later stages assume the earlier ones succeeded.

pub mod database;
pub mod services;
pub mod summary;
pub mod system;
pub mod templates;

use crate::core::{CommandStage, Idempotency, Pipeline, PipelineError, Stage};

pub use database::DatabaseSchema;
pub use services::{LogRotation, ReverseProxy, ServiceStart, SupervisorUnit};
pub use summary::DeploymentSummary;
pub use system::{ApplicationFiles, DeployRoot, PrivilegeGuard, PythonEnvironment, SystemPackages};

/// Name given to the provisioning pipeline
pub const PIPELINE_NAME: &str = "provision";

/// Stages of a full provisioning run, in execution order
pub fn standard_stages() -> Vec<Stage> {
    vec![
        Stage::new(
            "privilege-guard",
            "Refuse to run as root",
            Idempotency::NoOp,
            PrivilegeGuard,
        ),
        Stage::new(
            "system-packages",
            "Install system packages with apt-get",
            Idempotency::Idempotent,
            SystemPackages,
        ),
        Stage::new(
            "deploy-root",
            "Create the deployment root, logs and tmp directories",
            Idempotency::Idempotent,
            DeployRoot,
        ),
        Stage::new(
            "application-files",
            "Copy application files into the deployment root",
            Idempotency::Unsafe,
            ApplicationFiles,
        ),
        Stage::new(
            "python-environment",
            "Create the virtualenv and install requirements",
            Idempotency::Overwrite,
            PythonEnvironment,
        ),
        Stage::new(
            "database-schema",
            "Ensure database, account and grants; apply schema files",
            Idempotency::Idempotent,
            DatabaseSchema,
        ),
        Stage::new(
            "reverse-proxy",
            "Install the nginx site and reload after validation",
            Idempotency::Overwrite,
            ReverseProxy,
        ),
        Stage::new(
            "supervisor-unit",
            "Install and enable the systemd unit",
            Idempotency::Overwrite,
            SupervisorUnit,
        ),
        Stage::new(
            "firewall",
            "Allow SSH and HTTP(S), enable ufw",
            Idempotency::Idempotent,
            CommandStage::new(services::firewall_commands()),
        ),
        Stage::new(
            "log-rotation",
            "Install the logrotate policy",
            Idempotency::Overwrite,
            LogRotation,
        ),
        Stage::new(
            "service-start",
            "Restart the service and confirm it is active",
            Idempotency::Idempotent,
            ServiceStart,
        ),
        Stage::new(
            "summary",
            "Report paths, commands and security follow-ups",
            Idempotency::NoOp,
            DeploymentSummary,
        ),
    ]
}

/// Build the provisioning pipeline
pub fn standard_pipeline() -> Result<Pipeline, PipelineError> {
    Pipeline::new(PIPELINE_NAME, standard_stages())
}

//! Individual preflight checks

use crate::host::{HostCommand, HostRunner};
use crate::launcher::app_config::AppConfig;
use crate::launcher::error::{PreflightFailure, PreflightWarning};
use crate::launcher::probe::ServiceProbe;
use crate::launcher::settings::LauncherSettings;
use tracing::{info, warn};

/// Whether a failed check stops the launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Fatal,
    NonFatal,
}

/// Result of one named check, as shown by `cabinetctl preflight`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub name: &'static str,
    pub severity: Severity,
    pub passed: bool,
    pub detail: Option<String>,
}

impl CheckReport {
    pub fn passed(name: &'static str, severity: Severity) -> Self {
        Self {
            name,
            severity,
            passed: true,
            detail: None,
        }
    }

    pub fn failed(name: &'static str, severity: Severity, detail: impl Into<String>) -> Self {
        Self {
            name,
            severity,
            passed: false,
            detail: Some(detail.into()),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// The virtualenv interpreter must exist; nothing is repaired here
pub fn check_environment(settings: &LauncherSettings) -> Result<(), PreflightFailure> {
    if settings.python().is_file() {
        Ok(())
    } else {
        Err(PreflightFailure::EnvironmentMissing {
            venv: settings.venv.clone(),
        })
    }
}

/// Outcome of the dependency check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyStatus {
    Consistent,
    /// `pip check` complained and one reinstall fixed it
    Repaired,
    Unresolved(PreflightWarning),
}

/// `pip check`, then at most one reinstall of the requirements.
/// A `pip` that cannot be run at all is reported without a reinstall.
pub async fn check_dependencies(
    runner: &dyn HostRunner,
    settings: &LauncherSettings,
) -> DependencyStatus {
    let pip = settings.pip().display().to_string();

    let report = match runner.run(&HostCommand::new(&pip).arg("check")).await {
        Ok(output) if output.success() => return DependencyStatus::Consistent,
        Ok(output) => {
            let text = format!("{}{}", output.stdout, output.stderr);
            text.trim().to_string()
        }
        Err(e) => {
            warn!("Could not run dependency check: {}", e);
            return DependencyStatus::Unresolved(PreflightWarning::DependencyCheck(e.to_string()));
        }
    };
    warn!("Dependency check reported problems: {}", report);

    let reinstall = HostCommand::new(&pip)
        .args(["install", "-r"])
        .arg(settings.requirements.display().to_string());
    match runner.run_checked(&reinstall).await {
        Ok(_) => {
            info!("Reinstalled requirements from {}", settings.requirements.display());
            DependencyStatus::Repaired
        }
        Err(e) => {
            warn!("Requirement reinstall failed, continuing: {}", e);
            DependencyStatus::Unresolved(PreflightWarning::DependencyRepair(e.to_string()))
        }
    }
}

/// Load the runtime config; a missing or unloadable file is fatal,
/// failed self-validation is only a warning
pub fn check_config<F>(
    settings: &LauncherSettings,
    env: F,
) -> Result<(AppConfig, Option<PreflightWarning>), PreflightFailure>
where
    F: Fn(&str) -> Option<String>,
{
    let path = &settings.config_path;
    if !path.is_file() {
        return Err(PreflightFailure::ConfigMissing { path: path.clone() });
    }

    let unreadable = |reason: String| PreflightFailure::ConfigUnreadable {
        path: path.clone(),
        reason,
    };
    let mut config = AppConfig::from_file(path).map_err(|e| unreadable(e.to_string()))?;
    config
        .apply_overrides(env)
        .map_err(|e| unreadable(e.to_string()))?;

    let warning = config
        .self_validate()
        .err()
        .map(PreflightWarning::ConfigSelfValidation);
    if let Some(warning) = &warning {
        warn!("{}", warning);
    }

    Ok((config, warning))
}

/// One connection to the database, opened and closed
pub async fn check_dependent_service(
    probe: &dyn ServiceProbe,
    config: &AppConfig,
) -> Result<(), PreflightFailure> {
    probe
        .probe(&config.database)
        .await
        .map_err(|e| PreflightFailure::DependentServiceUnreachable {
            target: config.database.target(),
            reason: e.to_string(),
        })
}

/// Create the runtime directories; failures are returned as warnings
pub async fn prepare_directories(settings: &LauncherSettings) -> Vec<PreflightWarning> {
    let mut warnings = Vec::new();
    for dir in settings.runtime_dirs() {
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            let warning = PreflightWarning::DirectoryPrep {
                path: dir,
                reason: e.to_string(),
            };
            warn!("{}", warning);
            warnings.push(warning);
        }
    }
    warnings
}

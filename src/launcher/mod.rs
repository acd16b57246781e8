//! Preflight-gated application launcher
//!
//! Runs on every (re)start. Checks run in a fixed order; the first fatal
//! failure aborts the launch before the application is ever spawned.
//! Non-fatal findings are collected as warnings and logged.

pub mod app_config;
pub mod checks;
pub mod error;
pub mod probe;
pub mod process;
pub mod settings;

use crate::host::HostRunner;
use app_config::AppConfig;
use checks::{CheckReport, DependencyStatus, Severity};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

pub use error::{LaunchError, PreflightFailure, PreflightWarning};
pub use probe::{MySqlProbe, ServiceProbe};
pub use process::{AppExit, AppHandle, AppStarter, ChildSupervisor, LaunchSpec};
pub use settings::LauncherSettings;

/// Where the launcher is in its run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchPhase {
    Init,
    EnvironmentCheck,
    DependencyCheck,
    ConfigCheck,
    DependentServiceCheck,
    DirectoryPrep,
    Start,
    Running,
    Aborted,
}

/// Environment variable lookup used for runtime config overrides
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// A configuration that passed every fatal check
#[derive(Debug, Clone)]
pub struct Preflight {
    pub config: AppConfig,
    pub reports: Vec<CheckReport>,
}

pub struct Launcher<R, P, S> {
    settings: LauncherSettings,
    runner: R,
    probe: P,
    starter: S,
    env: EnvLookup,
    history: Vec<LaunchPhase>,
    warnings: Vec<PreflightWarning>,
}

impl<R, P, S> Launcher<R, P, S>
where
    R: HostRunner,
    P: ServiceProbe,
    S: AppStarter,
{
    pub fn new(settings: LauncherSettings, runner: R, probe: P, starter: S) -> Self {
        Self {
            settings,
            runner,
            probe,
            starter,
            env: Arc::new(|var: &str| std::env::var(var).ok()),
            history: vec![LaunchPhase::Init],
            warnings: Vec::new(),
        }
    }

    /// Replace the process environment as the source of config overrides
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(lookup);
        self
    }

    pub fn phase(&self) -> LaunchPhase {
        self.history.last().copied().unwrap_or(LaunchPhase::Init)
    }

    /// Every phase entered so far, in order
    pub fn history(&self) -> &[LaunchPhase] {
        &self.history
    }

    pub fn warnings(&self) -> &[PreflightWarning] {
        &self.warnings
    }

    pub fn starter(&self) -> &S {
        &self.starter
    }

    fn enter(&mut self, phase: LaunchPhase) {
        info!("Launcher phase: {:?}", phase);
        self.history.push(phase);
    }

    fn abort(&mut self, failure: PreflightFailure) -> PreflightFailure {
        error!("Preflight failed: {}", failure);
        self.history.push(LaunchPhase::Aborted);
        failure
    }

    fn warn(&mut self, warning: PreflightWarning) {
        self.warnings.push(warning);
    }

    /// Run every check up to, not including, the start
    pub async fn preflight(&mut self) -> Result<Preflight, PreflightFailure> {
        let mut reports = Vec::new();

        self.enter(LaunchPhase::EnvironmentCheck);
        if let Err(failure) = checks::check_environment(&self.settings) {
            return Err(self.abort(failure));
        }
        reports.push(CheckReport::passed("environment", Severity::Fatal));

        self.enter(LaunchPhase::DependencyCheck);
        let report = match checks::check_dependencies(&self.runner, &self.settings).await {
            DependencyStatus::Consistent => CheckReport::passed("dependencies", Severity::NonFatal),
            DependencyStatus::Repaired => CheckReport::passed("dependencies", Severity::NonFatal)
                .with_detail("reinstalled requirements"),
            DependencyStatus::Unresolved(warning) => {
                let report =
                    CheckReport::failed("dependencies", Severity::NonFatal, warning.to_string());
                self.warn(warning);
                report
            }
        };
        reports.push(report);

        self.enter(LaunchPhase::ConfigCheck);
        let env = self.env.clone();
        let (config, warning) = match checks::check_config(&self.settings, |var| env(var)) {
            Ok(loaded) => loaded,
            Err(failure) => return Err(self.abort(failure)),
        };
        reports.push(CheckReport::passed("config", Severity::Fatal));
        match warning {
            Some(warning) => {
                reports.push(CheckReport::failed(
                    "config-self-validation",
                    Severity::NonFatal,
                    warning.to_string(),
                ));
                self.warn(warning);
            }
            None => reports.push(CheckReport::passed(
                "config-self-validation",
                Severity::NonFatal,
            )),
        }

        self.enter(LaunchPhase::DependentServiceCheck);
        if let Err(failure) = checks::check_dependent_service(&self.probe, &config).await {
            return Err(self.abort(failure));
        }
        reports.push(
            CheckReport::passed("database", Severity::Fatal).with_detail(config.database.target()),
        );

        self.enter(LaunchPhase::DirectoryPrep);
        let dir_warnings = checks::prepare_directories(&self.settings).await;
        if dir_warnings.is_empty() {
            reports.push(CheckReport::passed("directories", Severity::NonFatal));
        } else {
            for warning in dir_warnings {
                reports.push(CheckReport::failed(
                    "directories",
                    Severity::NonFatal,
                    warning.to_string(),
                ));
                self.warn(warning);
            }
        }

        Ok(Preflight { config, reports })
    }

    /// How the application will be started for this config
    ///
    /// The listen address is exported as `HOST`/`PORT`; a gunicorn command
    /// without its own bind option also gets `--bind host:port`, which takes
    /// precedence over the bind in its config file.
    pub fn launch_spec(&self, config: &AppConfig) -> LaunchSpec {
        let (program, mut args) = match self.settings.app_command.split_first() {
            Some((program, args)) => (program.clone(), args.to_vec()),
            None => (String::new(), Vec::new()),
        };
        let flask_debug = if config.debug { "True" } else { "False" };
        let bind = format!("{}:{}", config.web.host, config.web.port);
        if is_gunicorn(&program) && !has_bind(&args) {
            args = ["--bind".to_string(), bind].into_iter().chain(args).collect();
        }

        LaunchSpec {
            program,
            args,
            working_dir: self.settings.home.clone(),
            env: vec![
                ("PYTHONPATH".to_string(), self.settings.home.display().to_string()),
                ("FLASK_ENV".to_string(), "production".to_string()),
                ("FLASK_DEBUG".to_string(), flask_debug.to_string()),
                ("HOST".to_string(), config.web.host.clone()),
                ("PORT".to_string(), config.web.port.to_string()),
                (
                    "CABINET_CONFIG".to_string(),
                    self.settings.config_path.display().to_string(),
                ),
            ],
        }
    }

    /// Preflight, start the application and supervise it until it ends
    pub async fn launch(&mut self) -> Result<AppExit, LaunchError> {
        let preflight = self.preflight().await?;

        self.enter(LaunchPhase::Start);
        let spec = self.launch_spec(&preflight.config);
        if spec.program.is_empty() {
            self.history.push(LaunchPhase::Aborted);
            return Err(LaunchError::Start("no application command configured".to_string()));
        }

        let handle = match self.starter.spawn(&spec).await {
            Ok(handle) => handle,
            Err(e) => {
                error!("{}", e);
                self.history.push(LaunchPhase::Aborted);
                return Err(e);
            }
        };

        self.enter(LaunchPhase::Running);
        if let Some(pid) = handle.id() {
            info!("Application running as pid {}", pid);
        }
        match handle.supervise().await? {
            AppExit::Exited(code) if code != 0 => Err(LaunchError::AppExited(code)),
            exit => Ok(exit),
        }
    }
}

fn is_gunicorn(program: &str) -> bool {
    Path::new(program).file_name().map_or(false, |name| name == "gunicorn")
}

fn has_bind(args: &[String]) -> bool {
    args.iter()
        .any(|arg| arg == "--bind" || arg.starts_with("--bind=") || arg.starts_with("-b"))
}

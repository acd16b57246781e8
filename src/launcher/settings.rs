//! Launcher settings from the environment

use crate::launcher::app_config::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

/// Deployment root used when `CABINET_HOME` is unset
pub const DEFAULT_HOME: &str = "/opt/drone-cabinet";

/// Matches the application's own connection timeout
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

/// Where the launcher finds the deployment and how it starts the application
#[derive(Debug, Clone, PartialEq)]
pub struct LauncherSettings {
    pub home: PathBuf,
    pub venv: PathBuf,
    pub config_path: PathBuf,
    pub requirements: PathBuf,
    /// Program followed by its arguments
    pub app_command: Vec<String>,
    pub probe_timeout: Duration,
}

impl LauncherSettings {
    /// Read `CABINET_*` variables from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = PathBuf::from(lookup("CABINET_HOME").unwrap_or_else(|| DEFAULT_HOME.to_string()));
        let venv = lookup("CABINET_VENV")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("venv"));
        let config_path = lookup("CABINET_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("config.yaml"));
        let requirements = lookup("CABINET_REQUIREMENTS")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("requirements.txt"));

        let app_command = match lookup("CABINET_APP_COMMAND") {
            Some(command) => {
                let parts: Vec<String> = command.split_whitespace().map(str::to_string).collect();
                if parts.is_empty() {
                    return Err(ConfigError::InvalidOverride {
                        var: "CABINET_APP_COMMAND".to_string(),
                        value: command,
                    });
                }
                parts
            }
            None => vec![
                venv.join("bin/gunicorn").display().to_string(),
                "-c".to_string(),
                "gunicorn.conf.py".to_string(),
                "web_api:app".to_string(),
            ],
        };

        let probe_timeout = match lookup("CABINET_PROBE_TIMEOUT_SECS") {
            Some(value) => {
                let invalid = || ConfigError::InvalidOverride {
                    var: "CABINET_PROBE_TIMEOUT_SECS".to_string(),
                    value: value.clone(),
                };
                // A zero timeout would fail every probe
                match value.trim().parse::<u64>() {
                    Ok(0) | Err(_) => return Err(invalid()),
                    Ok(secs) => Duration::from_secs(secs),
                }
            }
            None => Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
        };

        Ok(Self {
            home,
            venv,
            config_path,
            requirements,
            app_command,
            probe_timeout,
        })
    }

    /// Interpreter whose presence proves the environment was provisioned
    pub fn python(&self) -> PathBuf {
        self.venv.join("bin/python")
    }

    pub fn pip(&self) -> PathBuf {
        self.venv.join("bin/pip")
    }

    /// Directories the application writes into
    pub fn runtime_dirs(&self) -> [PathBuf; 2] {
        [self.home.join("logs"), self.home.join("tmp")]
    }
}

//! Provisioning configuration from YAML

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable naming the provisioning config file
pub const CONFIG_ENV: &str = "CABINET_PROVISION_CONFIG";

/// File looked up in the working directory when the variable is unset
pub const DEFAULT_CONFIG_FILE: &str = "provision.yaml";

/// Top-level provisioning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Service name; used for the unit, site and logrotate file names
    pub service: String,

    /// Human-readable description for the supervisor unit
    pub description: String,

    /// Deployment root the application is copied into
    pub deploy_root: PathBuf,

    /// Account that owns the deployment root and runs the service
    pub owner: String,
    pub group: String,

    /// Directory holding the application sources to deploy
    pub source_dir: PathBuf,

    /// System packages installed before anything else
    pub packages: Vec<String>,

    /// Virtual environment location (defaults to `<deploy_root>/venv`)
    pub venv_dir: Option<PathBuf>,

    /// Dependency list, relative to the deployment root
    pub requirements: PathBuf,

    pub database: DatabaseProvision,

    /// Schema and seed files applied in order, relative to the deployment root
    pub schema_files: Vec<PathBuf>,

    /// Domain served by the reverse proxy (`_` matches any host)
    pub server_name: String,

    /// Port the application listens on behind the proxy
    pub upstream_port: u16,

    /// Installed launcher binary the supervisor unit executes
    pub launcher_path: PathBuf,

    /// Binary copied to `launcher_path` (defaults to the running executable)
    pub launcher_source: Option<PathBuf>,
}

/// Database objects the schema stage ensures exist
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseProvision {
    pub name: String,
    pub user: String,
    pub password: String,
    /// Host part of the MySQL account
    pub user_host: String,
}

impl Default for DatabaseProvision {
    fn default() -> Self {
        Self {
            name: "drone_cabinet".to_string(),
            user: "drone_cabinet".to_string(),
            password: "change-this-password".to_string(),
            user_host: "localhost".to_string(),
        }
    }
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            service: "drone-cabinet".to_string(),
            description: "Drone cabinet control system".to_string(),
            deploy_root: PathBuf::from("/opt/drone-cabinet"),
            owner: "www-data".to_string(),
            group: "www-data".to_string(),
            source_dir: PathBuf::from("."),
            packages: [
                "python3",
                "python3-venv",
                "python3-pip",
                "nginx",
                "mysql-server",
                "ufw",
                "logrotate",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            venv_dir: None,
            requirements: PathBuf::from("requirements.txt"),
            database: DatabaseProvision::default(),
            schema_files: vec![
                PathBuf::from("database/schema.sql"),
                PathBuf::from("database/seed.sql"),
            ],
            server_name: "_".to_string(),
            upstream_port: 5000,
            launcher_path: PathBuf::from("/usr/local/bin/cabinetctl"),
            launcher_source: None,
        }
    }
}

impl ProvisionConfig {
    /// Load from `$CABINET_PROVISION_CONFIG`, then `./provision.yaml`, then defaults
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            info!("Loading provisioning config from {}", path);
            return Self::from_file(path);
        }
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            info!("Loading provisioning config from {}", DEFAULT_CONFIG_FILE);
            return Self::from_file(DEFAULT_CONFIG_FILE);
        }
        info!("No provisioning config found, using defaults");
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Load provisioning configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse provisioning configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ProvisionConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the provisioning configuration
    pub fn validate(&self) -> Result<()> {
        // These end up inside shell arguments, SQL and file names
        let name = Regex::new(r"^[A-Za-z0-9_-]+$")?;
        let sql_ident = Regex::new(r"^[A-Za-z0-9_]+$")?;

        for (field, value) in [
            ("service", &self.service),
            ("owner", &self.owner),
            ("group", &self.group),
        ] {
            if !name.is_match(value) {
                anyhow::bail!("Invalid {} '{}': use letters, digits, '-' or '_'", field, value);
            }
        }

        for (field, value) in [
            ("database.name", &self.database.name),
            ("database.user", &self.database.user),
        ] {
            if !sql_ident.is_match(value) {
                anyhow::bail!("Invalid {} '{}': use letters, digits or '_'", field, value);
            }
        }

        if self.database.user_host.contains('\'') {
            anyhow::bail!("Invalid database.user_host '{}'", self.database.user_host);
        }

        if !self.deploy_root.is_absolute() {
            anyhow::bail!(
                "deploy_root must be an absolute path, got '{}'",
                self.deploy_root.display()
            );
        }

        if self.packages.is_empty() {
            anyhow::bail!("packages must list at least one system package");
        }

        if self.upstream_port == 0 {
            anyhow::bail!("upstream_port must be nonzero");
        }

        Ok(())
    }

    pub fn venv_dir(&self) -> PathBuf {
        self.venv_dir
            .clone()
            .unwrap_or_else(|| self.deploy_root.join("venv"))
    }

    pub fn requirements_path(&self) -> PathBuf {
        self.deploy_root.join(&self.requirements)
    }

    /// Runtime configuration artifact read by the launcher
    pub fn app_config_path(&self) -> PathBuf {
        self.deploy_root.join("config.yaml")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.deploy_root.join("logs")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.deploy_root.join("tmp")
    }

    pub fn unit_name(&self) -> String {
        format!("{}.service", self.service)
    }

    pub fn unit_path(&self) -> String {
        format!("/etc/systemd/system/{}", self.unit_name())
    }

    pub fn site_available_path(&self) -> String {
        format!("/etc/nginx/sites-available/{}", self.service)
    }

    pub fn site_enabled_path(&self) -> String {
        format!("/etc/nginx/sites-enabled/{}", self.service)
    }

    pub fn logrotate_path(&self) -> String {
        format!("/etc/logrotate.d/{}", self.service)
    }

    /// `owner:group` as passed to chown
    pub fn ownership(&self) -> String {
        format!("{}:{}", self.owner, self.group)
    }
}

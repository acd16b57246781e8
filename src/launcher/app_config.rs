//! Runtime configuration read by the launcher

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading the runtime configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("environment variable {var} has invalid value '{value}'")]
    InvalidOverride { var: String, value: String },
}

/// Application runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseSettings,
    pub device: DeviceSettings,
    pub web: WebSettings,
    pub security: SecuritySettings,
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            name: "drone_cabinet".to_string(),
        }
    }
}

impl DatabaseSettings {
    /// `host:port`, as named in diagnostics
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Cabinet controller reached over Modbus TCP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            host: "192.168.1.100".to_string(),
            port: 502,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSettings {
    pub host: String,
    pub port: u16,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    pub secret_key: String,
    pub api_key: String,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            secret_key: "your-production-secret-key-change-this".to_string(),
            api_key: "default-api-key-change-this".to_string(),
        }
    }
}

/// Marker left in shipped placeholder secrets
const PLACEHOLDER_MARKER: &str = "change-this";

impl AppConfig {
    /// Parse from YAML; missing sections take their defaults
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Apply `DB_*`, `MODBUS_*`, `HOST`, `PORT`, `SECRET_KEY` and `API_KEY` overrides
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |var: &str, field: &mut String| {
            if let Some(value) = lookup(var) {
                *field = value;
            }
        };
        text("DB_HOST", &mut self.database.host);
        text("DB_USER", &mut self.database.user);
        text("DB_PASSWORD", &mut self.database.password);
        text("DB_NAME", &mut self.database.name);
        text("MODBUS_HOST", &mut self.device.host);
        text("HOST", &mut self.web.host);
        text("SECRET_KEY", &mut self.security.secret_key);
        text("API_KEY", &mut self.security.api_key);

        for (var, field) in [
            ("DB_PORT", &mut self.database.port),
            ("MODBUS_PORT", &mut self.device.port),
            ("PORT", &mut self.web.port),
        ] {
            if let Some(value) = lookup(var) {
                *field = value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidOverride {
                        var: var.to_string(),
                        value: value.clone(),
                    })?;
            }
        }

        Ok(())
    }

    /// Report every problem at once; none of them stop the service
    pub fn self_validate(&self) -> Result<(), Vec<String>> {
        let mut issues = Vec::new();

        for (field, value) in [
            ("security.secret_key", &self.security.secret_key),
            ("security.api_key", &self.security.api_key),
        ] {
            if value.trim().is_empty() {
                issues.push(format!("{} is empty", field));
            } else if value.contains(PLACEHOLDER_MARKER) {
                issues.push(format!("{} is still the shipped placeholder", field));
            }
        }

        if self.database.password.is_empty() {
            issues.push("database.password is empty".to_string());
        }
        if self.device.host.trim().is_empty() {
            issues.push("device.host is empty".to_string());
        }
        for (field, port) in [
            ("database.port", self.database.port),
            ("device.port", self.device.port),
            ("web.port", self.web.port),
        ] {
            if port == 0 {
                issues.push(format!("{} is 0", field));
            }
        }
        if self.debug {
            issues.push("debug is enabled".to_string());
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

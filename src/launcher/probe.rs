//! Dependent-service reachability

use crate::launcher::app_config::DatabaseSettings;
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::Connection;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("no answer within {secs} seconds")]
    Timeout { secs: u64 },

    #[error("{0}")]
    Connect(String),
}

/// Checks that the database the application needs is reachable
#[async_trait]
pub trait ServiceProbe: Send + Sync {
    async fn probe(&self, database: &DatabaseSettings) -> Result<(), ProbeError>;
}

/// Opens and closes one MySQL connection
#[derive(Debug, Clone)]
pub struct MySqlProbe {
    timeout: Duration,
}

impl MySqlProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for MySqlProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl ServiceProbe for MySqlProbe {
    async fn probe(&self, database: &DatabaseSettings) -> Result<(), ProbeError> {
        let options = MySqlConnectOptions::new()
            .host(&database.host)
            .port(database.port)
            .username(&database.user)
            .password(&database.password)
            .database(&database.name);

        debug!(
            "Connecting to mysql://{}@{}/{}",
            database.user,
            database.target(),
            database.name
        );
        let connection = timeout(self.timeout, MySqlConnection::connect_with(&options))
            .await
            .map_err(|_| ProbeError::Timeout {
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| ProbeError::Connect(e.to_string()))?;

        connection
            .close()
            .await
            .map_err(|e| ProbeError::Connect(e.to_string()))
    }
}

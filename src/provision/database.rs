//! Database, account and schema provisioning

use crate::core::config::ProvisionConfig;
use crate::core::{StageAction, StageContext, StageError, StageOutcome};
use crate::host::HostCommand;
use async_trait::async_trait;
use tracing::{info, warn};

/// Escape a value for a single-quoted MySQL string literal
fn sql_quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Statements ensuring the database, the account and its grant exist
///
/// Every statement is conditional, so running them again leaves the same
/// database, account and grant in place. Identifiers are validated when
/// the config is loaded.
pub fn provisioning_sql(config: &ProvisionConfig) -> String {
    let db = &config.database;
    let account = format!("'{}'@'{}'", db.user, db.user_host);
    format!(
        "CREATE DATABASE IF NOT EXISTS `{name}` CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci;\n\
         CREATE USER IF NOT EXISTS {account} IDENTIFIED BY '{password}';\n\
         GRANT ALL PRIVILEGES ON `{name}`.* TO {account};\n\
         FLUSH PRIVILEGES;\n",
        name = db.name,
        account = account,
        password = sql_quote(&db.password),
    )
}

/// Ensures the database objects exist, then applies the schema files
///
/// The statements travel on stdin so the password never shows up in the
/// process list. Schema files are applied in order; a file missing from
/// the deployment root is skipped with a note.
#[derive(Debug, Default)]
pub struct DatabaseSchema;

#[async_trait]
impl StageAction for DatabaseSchema {
    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutcome, StageError> {
        let config = ctx.config;
        let mut outcome = StageOutcome::default();

        info!(
            "Ensuring database {} and account {}@{}",
            config.database.name, config.database.user, config.database.user_host
        );
        ctx.run(HostCommand::sudo("mysql").stdin_text(provisioning_sql(config)))
            .await?;

        for file in &config.schema_files {
            let path = config.deploy_root.join(file).display().to_string();
            let present = ctx
                .check(HostCommand::sudo("test").args(["-f", path.as_str()]))
                .await?;

            if !present {
                warn!("Schema file {} not found, skipping", path);
                outcome = outcome.note(format!("schema file {} absent, skipped", file.display()));
                continue;
            }

            ctx.run(
                HostCommand::sudo("mysql")
                    .arg(config.database.name.as_str())
                    .arg("-e")
                    .arg(format!("source {}", path)),
            )
            .await?;
            outcome = outcome.note(format!("applied {}", file.display()));
        }

        Ok(outcome)
    }
}

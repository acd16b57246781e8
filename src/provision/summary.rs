//! Closing report for the operator

use crate::core::config::ProvisionConfig;
use crate::core::{StageAction, StageContext, StageError, StageOutcome};
use async_trait::async_trait;
use std::fmt::{self, Write};

/// Password shipped in the default provisioning config
const DEFAULT_DB_PASSWORD: &str = "change-this-password";

/// Prints where everything went and what still needs a human
#[derive(Debug, Default)]
pub struct DeploymentSummary;

#[async_trait]
impl StageAction for DeploymentSummary {
    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutcome, StageError> {
        let followups = security_followups(ctx.config);
        let mut outcome = StageOutcome::default();
        if !followups.is_empty() {
            outcome = outcome.note(format!("{} security follow-ups pending", followups.len()));
        }
        let report = render_report(ctx.config, &followups)
            .map_err(|e| StageError::Check(format!("cannot render summary: {}", e)))?;
        outcome.report = Some(report);
        Ok(outcome)
    }
}

/// Things left insecure or unset by an unattended run
pub fn security_followups(config: &ProvisionConfig) -> Vec<String> {
    let mut items = Vec::new();

    if config.database.password == DEFAULT_DB_PASSWORD {
        items.push(format!(
            "change the password of database account '{}' (still the default)",
            config.database.user
        ));
    }
    if config.server_name == "_" {
        items.push("set server_name to the real domain and re-run provisioning".to_string());
    }
    items.push(format!(
        "replace security.secret_key and security.api_key in {}",
        config.app_config_path().display()
    ));
    items.push("add HTTPS (for example with certbot --nginx)".to_string());

    items
}

fn render_report(config: &ProvisionConfig, followups: &[String]) -> Result<String, fmt::Error> {
    let unit = config.unit_name();
    let mut report = String::new();

    writeln!(report, "Deployment root:  {}", config.deploy_root.display())?;
    writeln!(report, "Runtime config:   {}", config.app_config_path().display())?;
    writeln!(report, "Virtualenv:       {}", config.venv_dir().display())?;
    writeln!(report, "Logs:             {}", config.logs_dir().display())?;
    writeln!(report, "Supervisor unit:  {}", config.unit_path())?;
    writeln!(report, "Proxy site:       {}", config.site_available_path())?;
    writeln!(report)?;
    writeln!(report, "Useful commands:")?;
    writeln!(report, "  sudo systemctl status {}", unit)?;
    writeln!(report, "  sudo systemctl restart {}", unit)?;
    writeln!(report, "  sudo journalctl -u {} -f", unit)?;
    writeln!(report, "  tail -f {}/*.log", config.logs_dir().display())?;
    writeln!(report, "  {} preflight", config.launcher_path.display())?;

    if !followups.is_empty() {
        writeln!(report)?;
        writeln!(report, "Security follow-ups:")?;
        for item in followups {
            writeln!(report, "  - {}", item)?;
        }
    }

    Ok(report)
}

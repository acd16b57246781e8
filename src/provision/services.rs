//! Service wiring: reverse proxy, supervisor unit, firewall, log rotation, start

use crate::core::{StageAction, StageContext, StageError, StageOutcome};
use crate::host::HostCommand;
use crate::provision::templates::{params, LOGROTATE_POLICY, NGINX_SITE, SYSTEMD_UNIT};
use async_trait::async_trait;
use tracing::{error, info};

/// Site shipped enabled by the nginx package
const DEFAULT_SITE: &str = "/etc/nginx/sites-enabled/default";

/// Installs and enables the nginx site, then reloads nginx
///
/// The reload is issued only after `nginx -t` accepts the configuration;
/// an invalid configuration fails the stage with the running proxy untouched.
#[derive(Debug, Default)]
pub struct ReverseProxy;

#[async_trait]
impl StageAction for ReverseProxy {
    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutcome, StageError> {
        let config = ctx.config;
        let port = config.upstream_port.to_string();
        let root = config.deploy_root.display().to_string();
        let site = NGINX_SITE.render(&params([
            ("server_name", config.server_name.as_str()),
            ("service", config.service.as_str()),
            ("upstream_port", port.as_str()),
            ("deploy_root", root.as_str()),
        ]))?;

        let available = config.site_available_path();
        ctx.install_file(&available, site).await?;
        ctx.run(HostCommand::sudo("ln").args([
            "-sf".to_string(),
            available.clone(),
            config.site_enabled_path(),
        ]))
        .await?;
        ctx.run(HostCommand::sudo("rm").args(["-f", DEFAULT_SITE]))
            .await?;

        let validation = ctx
            .runner
            .run(&HostCommand::sudo("nginx").arg("-t"))
            .await?;
        if !validation.success() {
            error!("nginx rejected {}: {}", available, validation.stderr.trim());
            return Err(StageError::Check(format!(
                "nginx configuration test failed, not reloading: {}",
                validation.stderr.trim()
            )));
        }

        ctx.run(HostCommand::sudo("systemctl").args(["reload", "nginx"]))
            .await?;
        Ok(StageOutcome::default().note(format!("site enabled at {}", config.site_enabled_path())))
    }
}

/// Installs the launcher binary and the supervisor unit, then enables the unit at boot
#[derive(Debug, Default)]
pub struct SupervisorUnit;

#[async_trait]
impl StageAction for SupervisorUnit {
    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutcome, StageError> {
        let config = ctx.config;
        let root = config.deploy_root.display().to_string();
        let venv = config.venv_dir().display().to_string();
        let config_path = config.app_config_path().display().to_string();
        let launcher = config.launcher_path.display().to_string();
        let unit = SYSTEMD_UNIT.render(&params([
            ("description", config.description.as_str()),
            ("owner", config.owner.as_str()),
            ("group", config.group.as_str()),
            ("deploy_root", root.as_str()),
            ("venv_dir", venv.as_str()),
            ("config_path", config_path.as_str()),
            ("launcher_path", launcher.as_str()),
        ]))?;

        let source = match &config.launcher_source {
            Some(path) => path.clone(),
            None => std::env::current_exe().map_err(|e| {
                StageError::Check(format!("cannot locate the launcher binary: {}", e))
            })?,
        };
        let mut outcome = StageOutcome::default();
        if source == config.launcher_path {
            outcome = outcome.note(format!("launcher already at {}", launcher));
        } else {
            ctx.run(
                HostCommand::sudo("install")
                    .args(["-m", "0755"])
                    .arg(source.display().to_string())
                    .arg(launcher.clone()),
            )
            .await?;
            outcome = outcome.note(format!("installed launcher to {}", launcher));
        }

        ctx.install_file(&config.unit_path(), unit).await?;
        ctx.run(HostCommand::sudo("systemctl").arg("daemon-reload"))
            .await?;
        ctx.run(HostCommand::sudo("systemctl").args(["enable".to_string(), config.unit_name()]))
            .await?;

        Ok(outcome)
    }
}

/// Commands opening SSH and HTTP(S), then enabling the firewall
pub fn firewall_commands() -> Vec<HostCommand> {
    vec![
        HostCommand::sudo("ufw").args(["allow", "OpenSSH"]),
        HostCommand::sudo("ufw").args(["allow", "Nginx Full"]),
        HostCommand::sudo("ufw").args(["--force", "enable"]),
    ]
}

/// Writes the rotation policy for the application logs
#[derive(Debug, Default)]
pub struct LogRotation;

#[async_trait]
impl StageAction for LogRotation {
    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutcome, StageError> {
        let config = ctx.config;
        let root = config.deploy_root.display().to_string();
        let policy = LOGROTATE_POLICY.render(&params([
            ("deploy_root", root.as_str()),
            ("owner", config.owner.as_str()),
            ("group", config.group.as_str()),
        ]))?;

        ctx.install_file(&config.logrotate_path(), policy).await?;
        Ok(StageOutcome::default())
    }
}

/// Restarts the service and confirms it came up
#[derive(Debug, Default)]
pub struct ServiceStart;

#[async_trait]
impl StageAction for ServiceStart {
    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutcome, StageError> {
        let unit = ctx.config.unit_name();

        ctx.run(HostCommand::sudo("systemctl").args(["restart".to_string(), unit.clone()]))
            .await?;

        // is-active exits nonzero for anything but "active"; read the word instead
        let state = ctx
            .runner
            .run(&HostCommand::new("systemctl").args(["is-active".to_string(), unit.clone()]))
            .await?;
        let state = state.stdout.trim().to_string();

        let status = ctx
            .runner
            .run(
                &HostCommand::new("systemctl")
                    .args(["status".to_string(), unit.clone()])
                    .arg("--no-pager"),
            )
            .await?;

        if state != "active" {
            return Err(StageError::Check(format!(
                "{} is {} after restart: {}",
                unit,
                if state.is_empty() { "unknown" } else { state.as_str() },
                status.stdout.lines().take(3).collect::<Vec<_>>().join(" / ")
            )));
        }

        info!("{} is active", unit);
        let mut outcome = StageOutcome::default().note(format!("{} is active", unit));
        let captured = status.stdout.trim();
        if !captured.is_empty() {
            outcome.report = Some(captured.to_string());
        }
        Ok(outcome)
    }
}

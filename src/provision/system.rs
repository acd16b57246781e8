//! Host preparation stages: guard, packages, directory tree, files, venv

use crate::core::{StageAction, StageContext, StageError, StageOutcome};
use crate::host::HostCommand;
use crate::provision::templates::{params, yaml_escape, APP_CONFIG};
use async_trait::async_trait;
use tracing::{debug, info};

/// Refuses to provision when invoked as root
///
/// Every privileged step escalates through `sudo` on its own, so running
/// the whole provisioner as root would only leave root-owned files behind.
#[derive(Debug, Default)]
pub struct PrivilegeGuard;

#[async_trait]
impl StageAction for PrivilegeGuard {
    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutcome, StageError> {
        let uid = ctx.run(HostCommand::new("id").arg("-u")).await?;
        let uid = uid.trim();
        debug!("Provisioner uid: {}", uid);

        if uid == "0" {
            return Err(StageError::Refused(
                "running as root; run as an unprivileged user with sudo rights".to_string(),
            ));
        }

        Ok(StageOutcome::default().note(format!("running as uid {}", uid)))
    }
}

/// Refreshes the package index and installs the configured packages
#[derive(Debug, Default)]
pub struct SystemPackages;

#[async_trait]
impl StageAction for SystemPackages {
    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutcome, StageError> {
        let packages = &ctx.config.packages;

        ctx.run(apt_get().arg("update")).await?;
        info!("Installing {} system packages", packages.len());
        ctx.run(apt_get().args(["install", "-y"]).args(packages.iter().cloned()))
            .await?;

        Ok(StageOutcome::default())
    }
}

fn apt_get() -> HostCommand {
    HostCommand::sudo("apt-get").env("DEBIAN_FRONTEND", "noninteractive")
}

/// Creates the deployment root with its logs and tmp directories
#[derive(Debug, Default)]
pub struct DeployRoot;

#[async_trait]
impl StageAction for DeployRoot {
    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutcome, StageError> {
        let config = ctx.config;

        ctx.run(HostCommand::sudo("mkdir").arg("-p").args([
            config.deploy_root.display().to_string(),
            config.logs_dir().display().to_string(),
            config.tmp_dir().display().to_string(),
        ]))
        .await?;
        chown_root(ctx).await?;

        Ok(StageOutcome::default())
    }
}

async fn chown_root(ctx: &StageContext<'_>) -> Result<(), StageError> {
    ctx.run(HostCommand::sudo("chown").args([
        "-R".to_string(),
        ctx.config.ownership(),
        ctx.config.deploy_root.display().to_string(),
    ]))
    .await
    .map(|_| ())
}

/// Copies the application tree into the deployment root
///
/// Files already in the root are overwritten wholesale. The runtime
/// config is the exception: a default one is written only when none exists.
#[derive(Debug, Default)]
pub struct ApplicationFiles;

#[async_trait]
impl StageAction for ApplicationFiles {
    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutcome, StageError> {
        let config = ctx.config;
        let mut outcome = StageOutcome::default();

        ctx.run(HostCommand::sudo("cp").args([
            "-a".to_string(),
            format!("{}/.", config.source_dir.display()),
            format!("{}/", config.deploy_root.display()),
        ]))
        .await?;

        let app_config = config.app_config_path().display().to_string();
        let exists = ctx
            .check(HostCommand::sudo("test").args(["-f", app_config.as_str()]))
            .await?;

        if exists {
            outcome = outcome.note(format!("kept existing {}", app_config));
        } else {
            let password = yaml_escape(&config.database.password);
            let port = config.upstream_port.to_string();
            let rendered = APP_CONFIG.render(&params([
                ("db_user", config.database.user.as_str()),
                ("db_password", password.as_str()),
                ("db_name", config.database.name.as_str()),
                ("web_port", port.as_str()),
            ]))?;
            ctx.install_file(&app_config, rendered).await?;
            outcome = outcome.note(format!("installed default {}", app_config));
        }

        chown_root(ctx).await?;
        Ok(outcome)
    }
}

/// Builds the virtual environment and installs requirements as the owner
#[derive(Debug, Default)]
pub struct PythonEnvironment;

#[async_trait]
impl StageAction for PythonEnvironment {
    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutcome, StageError> {
        let config = ctx.config;
        let venv = config.venv_dir();
        let pip = venv.join("bin/pip").display().to_string();

        ctx.run(
            HostCommand::sudo_as(&config.owner, "python3")
                .args(["-m", "venv"])
                .arg(venv.display().to_string()),
        )
        .await?;
        ctx.run(HostCommand::sudo_as(&config.owner, &pip).args(["install", "--upgrade", "pip"]))
            .await?;
        ctx.run(
            HostCommand::sudo_as(&config.owner, &pip)
                .args(["install", "-r"])
                .arg(config.requirements_path().display().to_string()),
        )
        .await?;

        Ok(StageOutcome::default())
    }
}

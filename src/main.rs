use anyhow::{Context, Result};
use cabinet_deploy::cli::commands::{StageListing, StagesCommand};
use cabinet_deploy::cli::output::*;
use cabinet_deploy::cli::{Cli, Command};
use cabinet_deploy::core::config::ProvisionConfig;
use cabinet_deploy::execution::{ExecutionEngine, ProvisionError};
use cabinet_deploy::host::SystemRunner;
use cabinet_deploy::launcher::{
    AppExit, ChildSupervisor, LaunchError, Launcher, LauncherSettings, MySqlProbe,
};
use cabinet_deploy::provision::{standard_pipeline, standard_stages};
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Reports longer than this are cut when printed
const REPORT_LINES: usize = 40;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    let code = match &cli.command {
        Command::Provision => provision().await?,
        Command::Launch => launch(false).await?,
        Command::Preflight => launch(true).await?,
        Command::Stages(cmd) => list_stages(cmd)?,
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

async fn provision() -> Result<i32> {
    let config = ProvisionConfig::load().context("Failed to load provisioning config")?;
    let mut pipeline = standard_pipeline().context("Failed to build provisioning pipeline")?;

    println!(
        "{} Provisioning {} into {}",
        INFO,
        style(&config.service).bold(),
        style(config.deploy_root.display()).cyan()
    );

    let mut engine = ExecutionEngine::new(SystemRunner::default(), config);
    engine.add_event_handler(|event| println!("{}", format_execution_event(event)));

    println!();
    let result = engine.execute(&mut pipeline).await;

    for stage in pipeline.stages() {
        if let Some(report) = stage.outcome().and_then(|o| o.report.as_deref()) {
            println!("\n{} {}", INFO, style(&stage.name).bold());
            println!("{}", format_output(report, REPORT_LINES));
        }
    }

    match result {
        Ok(()) => {
            println!(
                "\n{} {} completed {}",
                CHECK,
                style(&pipeline.name).bold(),
                style("successfully").green()
            );
            Ok(0)
        }
        Err(err) => {
            println!(
                "\n{} {} {}",
                CROSS,
                style(&pipeline.name).bold(),
                style("failed").red()
            );
            error!("{}", err);
            if matches!(err, ProvisionError::StageFailure { .. }) {
                let skipped: Vec<_> = pipeline
                    .stages()
                    .iter()
                    .filter(|s| !s.state.is_terminal())
                    .map(|s| format!("{} {}", s.name, format_stage_state(&s.state)))
                    .collect();
                if !skipped.is_empty() {
                    println!("  Not run: {}", skipped.join(", "));
                }
                println!("  Fix the host and run {} again", style("cabinetctl provision").bold());
            }
            Ok(1)
        }
    }
}

async fn launch(preflight_only: bool) -> Result<i32> {
    let settings = LauncherSettings::from_env().context("Invalid launcher environment")?;
    let probe = MySqlProbe::new(settings.probe_timeout);
    let mut launcher = Launcher::new(
        settings,
        SystemRunner::default(),
        probe,
        ChildSupervisor,
    );

    if preflight_only {
        let result = launcher.preflight().await;
        return Ok(match result {
            Ok(preflight) => {
                for report in &preflight.reports {
                    println!("{}", format_check_report(report));
                }
                println!("\n{} Preflight {}", CHECK, style("passed").green());
                0
            }
            Err(failure) => {
                println!("{} Preflight {}: {}", CROSS, style("failed").red(), failure);
                failure.exit_code()
            }
        });
    }

    match launcher.launch().await {
        Ok(AppExit::Stopped) => {
            println!("{} Application stopped", INFO);
            Ok(0)
        }
        Ok(AppExit::Exited(_)) => Ok(0),
        Err(err) => {
            error!("{}", err);
            if let LaunchError::Preflight(failure) = &err {
                println!("{} Not starting the application: {}", CROSS, failure);
            }
            Ok(err.exit_code())
        }
    }
}

fn list_stages(cmd: &StagesCommand) -> Result<i32> {
    let listing = StageListing::from_stages(&standard_stages());

    if cmd.json {
        let data = serde_json::json!({ "stages": listing });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(0);
    }

    println!("{} Provisioning stages, in order:", INFO);
    for row in &listing {
        println!("{}", format_stage_listing(row));
    }
    println!(
        "\n{} Stages marked ! overwrite manual changes when re-run",
        WARN
    );
    Ok(0)
}

//! Test: Full run - every stage succeeds on a cooperative host

use crate::helpers::*;
use cabinet_deploy::core::ExecutionStatus;
use cabinet_deploy::host::CommandOutput;

const ALL_STAGES: [&str; 12] = [
    "privilege-guard",
    "system-packages",
    "deploy-root",
    "application-files",
    "python-environment",
    "database-schema",
    "reverse-proxy",
    "supervisor-unit",
    "firewall",
    "log-rotation",
    "service-start",
    "summary",
];

#[tokio::test]
async fn test_full_provisioning() {
    let runner = MockRunner::new().respond(
        "systemctl status",
        CommandOutput::ok("● drone-cabinet.service\n     Active: active (running)\n"),
    );

    let run = run_provisioning(runner).await;

    run.result.as_ref().unwrap();
    assert_eq!(run.pipeline.state.status, ExecutionStatus::Completed);
    assert!(run.pipeline.is_complete());
    assert_executed_stages(&run, &ALL_STAGES);
    assert_eq!(run.pipeline.state.progress(), 1.0);

    let start = run.pipeline.stage("service-start").unwrap().outcome().unwrap();
    assert_eq!(start.notes, vec!["drone-cabinet.service is active"]);

    let summary = run.pipeline.stage("summary").unwrap().outcome().unwrap();
    let report = summary.report.as_deref().unwrap();
    assert!(report.contains("/opt/drone-cabinet/config.yaml"));
    assert!(report.contains("Security follow-ups:"));
}

/// Host commands appear in the order the stages declare them
#[tokio::test]
async fn test_host_sees_stage_order() {
    let run = run_provisioning(MockRunner::new()).await;
    let lines = run.runner.lines();

    let position = |fragment: &str| {
        lines
            .iter()
            .position(|line| line.contains(fragment))
            .unwrap_or_else(|| panic!("'{}' never ran", fragment))
    };

    assert!(position("id -u") < position("apt-get update"));
    assert!(position("apt-get install") < position("mkdir -p"));
    assert!(position("mkdir -p") < position("cp -a"));
    assert!(position("-m venv") < position("sudo mysql"));
    assert!(position("sudo nginx -t") < position("reload nginx"));
    assert!(position("install -m 0755") < position("systemctl enable"));
    assert!(position("daemon-reload") < position("ufw --force enable"));
    assert!(position("tee /etc/logrotate.d/drone-cabinet") < position("systemctl restart"));
}

#[tokio::test]
async fn test_existing_runtime_config_survives() {
    let run = run_provisioning(MockRunner::new()).await;

    assert!(!run.runner.ran("tee /opt/drone-cabinet/config.yaml"));
    let files = run.pipeline.stage("application-files").unwrap().outcome().unwrap();
    assert_eq!(files.notes, vec!["kept existing /opt/drone-cabinet/config.yaml"]);
}

#[tokio::test]
async fn test_launcher_installed_where_unit_runs_it() {
    let run = run_provisioning(MockRunner::new()).await;

    run.result.as_ref().unwrap();
    let lines = run.runner.lines();
    let install = lines
        .iter()
        .position(|line| line.starts_with("sudo install -m 0755 "))
        .expect("launcher binary never installed");
    let enable = lines
        .iter()
        .position(|line| line == "sudo systemctl enable drone-cabinet.service")
        .unwrap();
    assert!(install < enable);
    assert!(lines[install].ends_with(" /usr/local/bin/cabinetctl"));

    let unit = run.pipeline.stage("supervisor-unit").unwrap().outcome().unwrap();
    assert_eq!(unit.notes, vec!["installed launcher to /usr/local/bin/cabinetctl"]);
}

//! Test: Fail-fast - the first failing stage stops the run

use crate::helpers::*;

/// A package failure stops everything after it
#[tokio::test]
async fn test_package_failure_stops_pipeline() {
    let runner = MockRunner::new().fail("apt-get install", "E: Unable to locate package nginx");

    let run = run_provisioning(runner).await;

    assert!(run.pipeline.has_failed());
    assert_stage_failed(&run, "system-packages", "Unable to locate package");
    assert_executed_stages(&run, &["privilege-guard", "system-packages"]);
    assert_later_stages_pending(&run, "system-packages");
    assert!(!run.runner.ran("mkdir"));
}

/// Failure in the middle: nothing later runs, nothing earlier is undone
#[tokio::test]
async fn test_venv_failure_keeps_earlier_work() {
    let runner = MockRunner::new().fail("-m venv", "ensurepip is not available");

    let run = run_provisioning(runner).await;

    assert_stage_failed(&run, "python-environment", "ensurepip");
    assert_later_stages_pending(&run, "python-environment");
    assert!(run.runner.ran("sudo cp -a"));
    assert!(!run.runner.ran("mysql"));
    assert!(!run.runner.ran("rm -rf"));
    assert_eq!(run.pipeline.state.completed_stages, 4);
}

/// The last real stage can fail too; the summary is then never produced
#[tokio::test]
async fn test_inactive_service_fails_start() {
    let runner = MockRunner::new().respond(
        "is-active",
        cabinet_deploy::host::CommandOutput::failed(3, ""),
    );

    let run = run_provisioning(runner).await;

    assert_stage_failed(&run, "service-start", "after restart");
    assert!(run.pipeline.stage("summary").unwrap().outcome().is_none());
}

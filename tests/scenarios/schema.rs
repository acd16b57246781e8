//! Test: Schema provisioning - repeatable, tolerant of missing files

use crate::helpers::*;

/// Running the whole pipeline twice leaves the same database objects
#[tokio::test]
async fn test_schema_stage_twice_is_stable() {
    let runner = MockRunner::new();

    let first = run_provisioning(runner.clone()).await;
    first.result.unwrap();
    let after_first = runner.mysql();

    let second = run_provisioning(runner.clone()).await;
    second.result.unwrap();
    let after_second = runner.mysql();

    assert_eq!(after_first.databases, after_second.databases);
    assert_eq!(after_first.users, after_second.users);
    assert_eq!(after_first.grants, after_second.grants);
    assert_eq!(after_second.databases.len(), 1);
    assert!(after_second.users.contains("'drone_cabinet'@'localhost'"));
    assert_eq!(after_second.grants.len(), 1);
}

#[tokio::test]
async fn test_missing_seed_file_is_skipped() {
    let runner = MockRunner::new().without_file("/opt/drone-cabinet/database/seed.sql");

    let run = run_provisioning(runner).await;

    run.result.unwrap();
    assert_eq!(
        run.runner.mysql().sourced,
        vec!["/opt/drone-cabinet/database/schema.sql"]
    );
    let outcome = run.pipeline.stage("database-schema").unwrap().outcome().unwrap();
    assert!(outcome
        .notes
        .contains(&"schema file database/seed.sql absent, skipped".to_string()));
}

#[tokio::test]
async fn test_schema_files_apply_in_order() {
    let run = run_provisioning(MockRunner::new()).await;

    assert_eq!(
        run.runner.mysql().sourced,
        vec![
            "/opt/drone-cabinet/database/schema.sql",
            "/opt/drone-cabinet/database/seed.sql"
        ]
    );
}

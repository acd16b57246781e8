//! Test: Reverse proxy - nginx is reloaded only with a valid configuration

use crate::helpers::*;

#[tokio::test]
async fn test_invalid_site_never_reloads() {
    let runner = MockRunner::new().fail(
        "nginx -t",
        "nginx: [emerg] unknown directive \"proxy_pas\"",
    );

    let run = run_provisioning(runner).await;

    assert_stage_failed(&run, "reverse-proxy", "unknown directive");
    assert!(run.runner.ran("sudo nginx -t"));
    assert!(!run.runner.ran("systemctl reload nginx"));
    assert_later_stages_pending(&run, "reverse-proxy");
}

#[tokio::test]
async fn test_site_uses_configured_domain_and_port() {
    let mut config = cabinet_deploy::core::config::ProvisionConfig::default();
    config.server_name = "cabinet.example.com".to_string();
    config.upstream_port = 8000;

    let run = run_provisioning_with(MockRunner::new(), config).await;

    run.result.unwrap();
    let site = run
        .runner
        .commands()
        .into_iter()
        .find(|c| c.args == ["/etc/nginx/sites-available/drone-cabinet"])
        .and_then(|c| c.stdin)
        .unwrap();
    assert!(site.contains("server_name cabinet.example.com;"));
    assert!(site.contains("proxy_pass http://127.0.0.1:8000;"));
}

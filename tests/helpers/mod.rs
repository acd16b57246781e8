//! Test utilities for cabinet-deploy scenarios

use async_trait::async_trait;
use cabinet_deploy::core::config::ProvisionConfig;
use cabinet_deploy::core::{Pipeline, StageState};
use cabinet_deploy::execution::{ExecutionEngine, ProvisionError};
use cabinet_deploy::host::{CommandError, CommandOutput, HostCommand, HostRunner};
use cabinet_deploy::launcher::app_config::DatabaseSettings;
use cabinet_deploy::launcher::probe::{ProbeError, ServiceProbe};
use cabinet_deploy::launcher::{
    AppExit, AppHandle, AppStarter, LaunchError, LaunchSpec, Launcher, LauncherSettings,
};
use cabinet_deploy::provision::standard_pipeline;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Database objects the fake MySQL server holds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MySqlState {
    pub databases: BTreeSet<String>,
    pub users: BTreeSet<String>,
    pub grants: BTreeSet<String>,
    /// Schema files sourced, in order
    pub sourced: Vec<String>,
}

#[derive(Debug, Default)]
struct HostState {
    commands: Vec<HostCommand>,
    mysql: MySqlState,
    /// Targets written by `install`
    installed: BTreeSet<String>,
}

/// Simulated host
///
/// Records every command. Scripted responses win; otherwise a small model
/// of the host answers: `id -u`, `test -f` against a set of present files,
/// `install`, the `mysql` client and `systemctl is-active`, which reports
/// `active` only once the unit's launcher binary has been installed.
/// Everything else succeeds.
/// Clones share state, so a clone handed to the engine can be inspected
/// through the runner the test kept.
#[derive(Clone)]
pub struct MockRunner {
    uid: u32,
    files: Arc<HashSet<String>>,
    launcher: String,
    script: Arc<Vec<(String, CommandOutput)>>,
    state: Arc<Mutex<HostState>>,
}

impl MockRunner {
    /// A non-root host where every configured schema file is present
    pub fn new() -> Self {
        let config = ProvisionConfig::default();
        let files = config
            .schema_files
            .iter()
            .map(|f| config.deploy_root.join(f).display().to_string())
            .chain(std::iter::once(config.app_config_path().display().to_string()))
            .collect();
        Self {
            uid: 1000,
            files: Arc::new(files),
            launcher: config.launcher_path.display().to_string(),
            script: Arc::new(Vec::new()),
            state: Arc::new(Mutex::new(HostState::default())),
        }
    }

    pub fn as_root(mut self) -> Self {
        self.uid = 0;
        self
    }

    pub fn without_file(mut self, path: &str) -> Self {
        Arc::make_mut(&mut self.files).remove(path);
        self
    }

    /// Fail every command whose display line contains `pattern`
    pub fn fail(self, pattern: &str, stderr: &str) -> Self {
        self.respond(pattern, CommandOutput::failed(1, stderr))
    }

    pub fn respond(mut self, pattern: &str, output: CommandOutput) -> Self {
        Arc::make_mut(&mut self.script).push((pattern.to_string(), output));
        self
    }

    pub fn commands(&self) -> Vec<HostCommand> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.commands().iter().map(HostCommand::display).collect()
    }

    pub fn ran(&self, fragment: &str) -> bool {
        self.lines().iter().any(|line| line.contains(fragment))
    }

    pub fn mysql(&self) -> MySqlState {
        self.state.lock().unwrap().mysql.clone()
    }

    fn simulate(&self, command: &HostCommand, state: &mut HostState) -> CommandOutput {
        let args: Vec<&str> = command.args.iter().map(String::as_str).collect();
        match (command.program.as_str(), args.as_slice()) {
            ("id", ["-u"]) => CommandOutput::ok(format!("{}\n", self.uid)),
            ("test", ["-f", path]) => {
                if self.files.contains(*path) {
                    CommandOutput::ok("")
                } else {
                    CommandOutput::failed(1, "")
                }
            }
            ("install", [.., _source, target]) => {
                state.installed.insert(target.to_string());
                CommandOutput::ok("")
            }
            ("systemctl", ["is-active", _]) => {
                if state.installed.contains(&self.launcher) || self.files.contains(&self.launcher) {
                    CommandOutput::ok("active\n")
                } else {
                    CommandOutput {
                        code: Some(3),
                        stdout: "failed\n".to_string(),
                        stderr: String::new(),
                    }
                }
            }
            ("mysql", [_db, "-e", source]) => {
                let path = source.trim_start_matches("source ").to_string();
                state.mysql.sourced.push(path);
                CommandOutput::ok("")
            }
            ("mysql", []) => {
                let sql = command.stdin.clone().unwrap_or_default();
                apply_sql(&sql, &mut state.mysql);
                CommandOutput::ok("")
            }
            _ => CommandOutput::ok(""),
        }
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply the provisioning statements the way MySQL would
fn apply_sql(sql: &str, mysql: &mut MySqlState) {
    for statement in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        if let Some(rest) = statement.strip_prefix("CREATE DATABASE IF NOT EXISTS ") {
            let name = rest.split_whitespace().next().unwrap_or_default();
            mysql.databases.insert(name.trim_matches('`').to_string());
        } else if let Some(rest) = statement.strip_prefix("CREATE USER IF NOT EXISTS ") {
            let account = rest.split_whitespace().next().unwrap_or_default();
            mysql.users.insert(account.to_string());
        } else if let Some(rest) = statement.strip_prefix("GRANT ") {
            mysql.grants.insert(rest.to_string());
        }
    }
}

#[async_trait]
impl HostRunner for MockRunner {
    async fn run(&self, command: &HostCommand) -> Result<CommandOutput, CommandError> {
        let line = command.display();
        let mut state = self.state.lock().unwrap();
        state.commands.push(command.clone());

        if let Some((_, output)) = self
            .script
            .iter()
            .find(|(pattern, _)| line.contains(pattern.as_str()))
        {
            return Ok(output.clone());
        }
        Ok(self.simulate(command, &mut state))
    }
}

/// Result of a provisioning run against a mock host
pub struct ProvisionRun {
    pub pipeline: Pipeline,
    pub result: Result<(), ProvisionError>,
    pub runner: MockRunner,
}

/// Run the standard pipeline with default config against `runner`
pub async fn run_provisioning(runner: MockRunner) -> ProvisionRun {
    run_provisioning_with(runner, ProvisionConfig::default()).await
}

pub async fn run_provisioning_with(runner: MockRunner, config: ProvisionConfig) -> ProvisionRun {
    let mut pipeline = standard_pipeline().unwrap();
    let engine = ExecutionEngine::new(runner.clone(), config);
    let result = engine.execute(&mut pipeline).await;
    ProvisionRun {
        pipeline,
        result,
        runner,
    }
}

/// Assert the stages that ran, in order
pub fn assert_executed_stages(run: &ProvisionRun, expected: &[&str]) {
    assert_eq!(
        run.pipeline.executed_stages(),
        expected,
        "unexpected stages executed"
    );
}

/// Assert a stage failed with an error containing `fragment`
pub fn assert_stage_failed(run: &ProvisionRun, stage: &str, fragment: &str) {
    match run.pipeline.stage(stage).map(|s| &s.state) {
        Some(StageState::Failed { error, .. }) => assert!(
            error.contains(fragment),
            "stage '{}' failed with '{}', expected '{}'",
            stage,
            error,
            fragment
        ),
        other => panic!("stage '{}' should have failed, state: {:?}", stage, other),
    }
    assert_eq!(
        run.result.as_ref().err().and_then(|e| e.stage_name()),
        Some(stage)
    );
}

/// Assert no stage after `stage` left the pending state
pub fn assert_later_stages_pending(run: &ProvisionRun, stage: &str) {
    let later = run
        .pipeline
        .stages()
        .iter()
        .skip_while(|s| s.name != stage)
        .skip(1);
    for s in later {
        assert!(
            matches!(s.state, StageState::Pending),
            "stage '{}' should not have run",
            s.name
        );
    }
}

/// Probe with a fixed answer that counts its calls
#[derive(Clone, Default)]
pub struct MockProbe {
    unreachable: Option<String>,
    calls: Arc<AtomicUsize>,
    targets: Arc<Mutex<Vec<String>>>,
}

impl MockProbe {
    pub fn reachable() -> Self {
        Self::default()
    }

    pub fn refusing(reason: &str) -> Self {
        Self {
            unreachable: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServiceProbe for MockProbe {
    async fn probe(&self, database: &DatabaseSettings) -> Result<(), ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.targets.lock().unwrap().push(database.target());
        match &self.unreachable {
            Some(reason) => Err(ProbeError::Connect(reason.clone())),
            None => Ok(()),
        }
    }
}

/// Starter that records what it was asked to start
#[derive(Clone)]
pub struct MockStarter {
    exit: AppExit,
    started: Arc<Mutex<Vec<LaunchSpec>>>,
}

impl MockStarter {
    pub fn exiting_with(exit: AppExit) -> Self {
        Self {
            exit,
            started: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn started(&self) -> Vec<LaunchSpec> {
        self.started.lock().unwrap().clone()
    }
}

impl Default for MockStarter {
    fn default() -> Self {
        Self::exiting_with(AppExit::Stopped)
    }
}

struct MockHandle(AppExit);

#[async_trait]
impl AppHandle for MockHandle {
    fn id(&self) -> Option<u32> {
        Some(4242)
    }

    async fn supervise(self: Box<Self>) -> Result<AppExit, LaunchError> {
        Ok(self.0)
    }
}

#[async_trait]
impl AppStarter for MockStarter {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<Box<dyn AppHandle>, LaunchError> {
        self.started.lock().unwrap().push(spec.clone());
        Ok(Box::new(MockHandle(self.exit)))
    }
}

/// A deployment root on disk
pub struct TestDeployment {
    pub dir: tempfile::TempDir,
    pub settings: LauncherSettings,
}

impl TestDeployment {
    /// Empty root: no venv, no config
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().display().to_string();
        let settings =
            LauncherSettings::from_lookup(|var| (var == "CABINET_HOME").then(|| home.clone()))
                .unwrap();
        Self { dir, settings }
    }

    /// Root with a venv interpreter and the given runtime config
    pub fn provisioned(config_yaml: &str) -> Self {
        Self::empty().with_venv().with_config(config_yaml)
    }

    pub fn with_venv(self) -> Self {
        std::fs::create_dir_all(self.settings.venv.join("bin")).unwrap();
        std::fs::write(self.settings.python(), "#!/bin/sh\n").unwrap();
        self
    }

    pub fn with_config(self, yaml: &str) -> Self {
        std::fs::write(&self.settings.config_path, yaml).unwrap();
        self
    }

    pub fn launcher(
        &self,
        runner: MockRunner,
        probe: MockProbe,
        starter: MockStarter,
    ) -> Launcher<MockRunner, MockProbe, MockStarter> {
        Launcher::new(self.settings.clone(), runner, probe, starter).with_env_lookup(|_| None)
    }
}

/// Runtime config that passes self-validation
pub const CLEAN_CONFIG: &str = r#"
database:
  host: "localhost"
  user: "drone_cabinet"
  password: "s3cret"
security:
  secret_key: "0d1f6a"
  api_key: "k-123"
"#;

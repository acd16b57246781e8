//! Scripted runner for unit tests

use crate::host::{CommandError, CommandOutput, HostCommand, HostRunner};
use async_trait::async_trait;
use std::sync::Mutex;

/// Records every command and answers from a script
///
/// A scripted response applies to every command whose display line
/// contains its pattern; the first matching pattern wins. Unscripted
/// commands succeed with empty output.
#[derive(Default)]
pub struct RecordingRunner {
    script: Vec<(String, CommandOutput)>,
    seen: Mutex<Vec<HostCommand>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, pattern: &str, output: CommandOutput) -> Self {
        self.script.push((pattern.to_string(), output));
        self
    }

    pub fn commands(&self) -> Vec<HostCommand> {
        self.seen.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.commands().iter().map(HostCommand::display).collect()
    }

    pub fn ran(&self, fragment: &str) -> bool {
        self.lines().iter().any(|line| line.contains(fragment))
    }
}

#[async_trait]
impl HostRunner for RecordingRunner {
    async fn run(&self, command: &HostCommand) -> Result<CommandOutput, CommandError> {
        let line = command.display();
        self.seen.lock().unwrap().push(command.clone());
        Ok(self
            .script
            .iter()
            .find(|(pattern, _)| line.contains(pattern.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::ok("")))
    }
}

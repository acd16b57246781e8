//! Command descriptors and captured output

/// How a command is elevated before it runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Escalation {
    /// Run as the invoking user
    None,
    /// Run through `sudo`
    Root,
    /// Run through `sudo -u <user>`
    User(String),
}

/// A single host command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCommand {
    pub program: String,
    pub args: Vec<String>,
    pub escalation: Escalation,
    /// Extra environment, passed through `env` so it survives `sudo`
    pub env: Vec<(String, String)>,
    /// Text fed to standard input (keeps secrets off the argument list)
    pub stdin: Option<String>,
}

impl HostCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            escalation: Escalation::None,
            env: Vec::new(),
            stdin: None,
        }
    }

    pub fn sudo(program: impl Into<String>) -> Self {
        Self::new(program).escalate(Escalation::Root)
    }

    pub fn sudo_as(user: impl Into<String>, program: impl Into<String>) -> Self {
        Self::new(program).escalate(Escalation::User(user.into()))
    }

    pub fn escalate(mut self, escalation: Escalation) -> Self {
        self.escalation = escalation;
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin_text(mut self, text: impl Into<String>) -> Self {
        self.stdin = Some(text.into());
        self
    }

    /// Full argument vector as it will be spawned, escalation included
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::new();
        match &self.escalation {
            Escalation::None => {}
            Escalation::Root => argv.push("sudo".to_string()),
            Escalation::User(user) => {
                argv.extend(["sudo".to_string(), "-u".to_string(), user.clone()]);
            }
        }
        if !self.env.is_empty() {
            argv.push("env".to_string());
            argv.extend(self.env.iter().map(|(k, v)| format!("{}={}", k, v)));
        }
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Shell-like rendering for logs and error messages
    pub fn display(&self) -> String {
        self.argv()
            .iter()
            .map(|part| {
                if part.is_empty() || part.contains(char::is_whitespace) {
                    format!("'{}'", part)
                } else {
                    part.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

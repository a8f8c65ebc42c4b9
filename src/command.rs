//! Launch command for the agent CLI.

use crate::config::AgentConfig;
use serde_json::{json, Value};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// A ready-to-run command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    /// Program to execute.
    pub program: OsString,
    /// Arguments, in order.
    pub args: Vec<OsString>,
    /// Working directory, if any.
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables.
    pub env: Vec<(OsString, OsString)>,
}

impl LaunchCommand {
    /// Creates a command with no arguments.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Adds an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Derives the stream-json CLI invocation from a configuration.
    ///
    /// Uses [`AgentConfig::launch`] verbatim when set.
    #[must_use]
    pub fn for_config(config: &AgentConfig) -> Self {
        if let Some(ref launch) = config.launch {
            return launch.clone();
        }
        let mut cmd = Self::new(&config.binary)
            .arg("--print")
            .args(["--input-format", "stream-json"])
            .args(["--output-format", "stream-json"])
            .arg("--verbose")
            .args(["--model", config.model.as_str()])
            .args(["--system-prompt", config.system_prompt.as_str()]);
        if !config.mcp_servers.is_empty() {
            cmd = cmd.arg("--mcp-config").arg(mcp_config(config).to_string());
        }
        if let Some(ref key) = config.session_key {
            cmd = cmd.args(["--resume", key.as_str()]);
        }
        if config.skip_permissions {
            cmd = cmd.arg("--dangerously-skip-permissions");
        }
        cmd.current_dir(&config.sandbox_dir)
    }

    /// Builds a `std::process::Command` with all streams piped.
    #[must_use]
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

fn mcp_config(config: &AgentConfig) -> Value {
    json!({ "mcpServers": config.mcp_servers })
}

//! Configuration for agent sessions.

use crate::command::LaunchCommand;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Default agent name.
pub const DEFAULT_NAME: &str = "MyName";
/// Default system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";
/// Default model.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
/// Default sandbox directory the process runs in.
pub const DEFAULT_SANDBOX_DIR: &str = "./sandbox";
/// Default CLI binary.
pub const DEFAULT_BINARY: &str = "claude";

/// Configuration for an agent.
///
/// Built once by the caller and moved into [`crate::Agent::new`]; there is no
/// process-wide default object.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Display name of the agent.
    pub name: String,
    /// Fully resolved system prompt.
    pub system_prompt: String,
    /// Model passed to the CLI.
    pub model: String,
    /// Working directory of the CLI process, created on connect.
    pub sandbox_dir: PathBuf,
    /// MCP servers by name, passed as `--mcp-config`.
    pub mcp_servers: BTreeMap<String, Value>,
    /// Session to resume.
    pub session_key: Option<String>,
    /// Whether to skip permission prompts (dangerous mode).
    pub skip_permissions: bool,
    /// CLI binary to launch.
    pub binary: String,
    /// Replaces the derived launch command entirely.
    pub launch: Option<LaunchCommand>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            sandbox_dir: PathBuf::from(DEFAULT_SANDBOX_DIR),
            mcp_servers: BTreeMap::new(),
            session_key: None,
            skip_permissions: false,
            binary: DEFAULT_BINARY.to_string(),
            launch: None,
        }
    }
}

impl AgentConfig {
    /// Creates a configuration with the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the agent name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Sets the model to use for the session.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the sandbox directory.
    #[must_use]
    pub fn with_sandbox_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sandbox_dir = dir.into();
        self
    }

    /// Adds an MCP server definition.
    #[must_use]
    pub fn with_mcp_server(mut self, name: impl Into<String>, server: Value) -> Self {
        self.mcp_servers.insert(name.into(), server);
        self
    }

    /// Sets the session key for resuming a previous session.
    #[must_use]
    pub fn with_session_key(mut self, key: impl Into<String>) -> Self {
        self.session_key = Some(key.into());
        self
    }

    /// Enables dangerous mode to skip permission prompts.
    #[must_use]
    pub const fn with_skip_permissions(mut self) -> Self {
        self.skip_permissions = true;
        self
    }

    /// Sets the CLI binary.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Launches `launch` instead of the derived CLI command.
    #[must_use]
    pub fn with_launch(mut self, launch: LaunchCommand) -> Self {
        self.launch = Some(launch);
        self
    }
}

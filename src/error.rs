//! Error types for the agent-cli-session library.

use std::io;

/// The result type for agent-cli-session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when connecting to or talking with the agent process.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No process is connected.
    #[error("Not connected to the agent process")]
    NotConnected,
    /// `connect` was called while a connection is already active.
    #[error("Agent process is already connected")]
    AlreadyConnected,
    /// The process input stream has already been closed.
    #[error("Agent process input stream is closed")]
    InputClosed,
    /// Failed to spawn the CLI process.
    #[error("Failed to spawn CLI process: {source}")]
    SpawnFailed {
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Failed to write to the process stdin.
    #[error("Failed to write to process stdin: {source}")]
    StdinWriteFailed {
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Failed to collect the exit status of the process.
    #[error("Failed to wait for CLI process: {source}")]
    WaitFailed {
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The CLI process exited with a non-zero status.
    #[error(
        "CLI process failed with exit code {}: {}",
        .exit_code.map_or_else(|| "unknown".to_string(), |c| c.to_string()),
        .stderr.as_deref().unwrap_or("no stderr captured")
    )]
    ProcessFailed {
        /// The exit code, if available.
        exit_code: Option<i32>,
        /// Error message from stderr, if available.
        stderr: Option<String>,
    },
    /// The system prompt still contains template delimiters after rendering.
    #[error("System prompt contains unresolved template syntax: {fragment}")]
    UnresolvedTemplate {
        /// The first unresolved fragment found.
        fragment: String,
    },
    /// The system prompt template failed to render.
    #[error("Failed to render system prompt: {0}")]
    Template(#[from] minijinja::Error),
    /// The setup action passed to `connect_with` failed with a foreign error.
    #[error("Setup action failed: {0}")]
    Setup(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wraps an arbitrary error raised by a setup action.
    pub fn setup(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Setup(err.into())
    }

    /// Whether this error means the process connection is missing, closed or failed.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::NotConnected
                | Self::AlreadyConnected
                | Self::InputClosed
                | Self::StdinWriteFailed { .. }
                | Self::ProcessFailed { .. }
        )
    }

    /// Whether this error means the system prompt could not be fully resolved.
    #[must_use]
    pub const fn is_parse_error(&self) -> bool {
        matches!(self, Self::UnresolvedTemplate { .. } | Self::Template(_))
    }
}

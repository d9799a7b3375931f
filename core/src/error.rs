use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CopilotErr>;

#[derive(Error, Debug)]
pub enum CopilotErr {
    /// The external CLI could not be started at all (binary missing,
    /// permission denied, bad working directory, ...).
    #[error("Failed to execute copilot: {source}")]
    Spawn {
        #[source]
        source: io::Error,
    },

    /// The CLI produced nothing on stdout and its stderr asked the user to
    /// log in. Detected heuristically; see `orchestrator::looks_like_auth_prompt`.
    #[error("GitHub Copilot CLI requires authentication. Please run: copilot /login")]
    AuthenticationRequired,

    /// The hard deadline elapsed before the CLI wrote anything to stdout.
    #[error("Copilot CLI command timed out with no response")]
    Timeout,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CopilotErr {
    pub(crate) fn spawn(source: io::Error) -> Self {
        Self::Spawn { source }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionErr {
    #[error("Session not found: {0}")]
    NotFound(String),
}

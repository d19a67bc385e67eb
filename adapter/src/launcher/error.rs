//! Error types for launching and supervising servers

use std::path::PathBuf;

use thiserror::Error;

/// Broad classification of a [`LaunchError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    RuntimeUnmet,
    Spawn,
    ProcessExit,
}

/// Errors returned by the command resolver and the launcher
#[derive(Error, Debug)]
pub enum LaunchError {
    /// Bad input, e.g. an empty server name
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("server '{server}' is not installed (expected {install_dir})")]
    ServerNotInstalled { server: String, install_dir: PathBuf },

    #[error("entrypoint not found for server '{server}' (tried {})", display_paths(.tried))]
    EntrypointNotFound { server: String, tried: Vec<PathBuf> },

    #[error("server '{server}' is not running (state: {state})")]
    NotRunning { server: String, state: String },

    #[error("server '{0}' is already running")]
    AlreadyRunning(String),

    /// Required runtime missing or its version does not satisfy the constraint
    #[error("runtime unmet for server '{server}': {reason}")]
    RuntimeUnmet { server: String, reason: String },

    /// The OS refused to create the process
    #[error("failed to start server '{server}': {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server '{server}' exited with code {code}")]
    ProcessExit { server: String, code: i32 },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl LaunchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LaunchError::Validation(_) => ErrorKind::Validation,
            LaunchError::ServerNotInstalled { .. }
            | LaunchError::EntrypointNotFound { .. }
            | LaunchError::NotRunning { .. } => ErrorKind::NotFound,
            LaunchError::AlreadyRunning(_) => ErrorKind::Conflict,
            LaunchError::RuntimeUnmet { .. } => ErrorKind::RuntimeUnmet,
            LaunchError::Spawn { .. } => ErrorKind::Spawn,
            LaunchError::ProcessExit { .. } => ErrorKind::ProcessExit,
        }
    }
}

/// Result type alias for launcher operations
pub type LaunchResult<T> = Result<T, LaunchError>;

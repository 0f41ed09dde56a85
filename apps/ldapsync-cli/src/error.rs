//! CLI error types and exit codes

use ldapsync_directory::DirectoryError;
use ldapsync_engine::{ConfigError, StoreError, SyncError};
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: Run finished with per-group errors
/// - 2: Configuration error
/// - 3: Directory or connection error
/// - 4: Group store error
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read {path}: {source}")]
    Input {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Group store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Sync(SyncError),

    #[error("{failed} group(s) failed")]
    RunFailed { failed: usize },

    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::RunFailed { .. } | CliError::Output(_) => 1,
            CliError::Config(_) | CliError::Input { .. } => 2,
            CliError::Directory(_) => 3,
            CliError::Store(_) => 4,
            CliError::Sync(e) => match e {
                SyncError::NotSyncedFromSource { .. } | SyncError::Configuration { .. } => 2,
                _ => 1,
            },
        }
    }

    /// Print the error to stderr with appropriate formatting
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {}", self);
        } else {
            eprintln!("Error: {}", self);
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {}", suggestion);
            } else {
                eprintln!("\nSuggestion: {}", suggestion);
            }
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::Directory(DirectoryError::AuthenticationFailed { .. }) => {
                Some("Check bind_dn and bind_password in the connection settings.")
            }
            CliError::Directory(DirectoryError::ConnectionFailed { .. }) => {
                Some("Check host, port and TLS settings, and that the server is reachable.")
            }
            CliError::RunFailed { .. } => Some("Re-run with --verbose for per-group details."),
            _ => None,
        }
    }
}

impl From<SyncError> for CliError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Directory(e) => CliError::Directory(e),
            SyncError::Store(e) => CliError::Store(e),
            other => CliError::Sync(other),
        }
    }
}

use indexsync_core::{ConfigError, ReconcileError};
use std::fmt;
use std::process;

/// Exit codes for the CLI; success exits with 0.
pub const EXIT_INDEX_BUILD: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_CONNECTION: i32 = 3;

/// Unified error type for CLI operations.
pub enum CliError {
    /// Unreadable, unparsable or invalid configuration.
    Config(ConfigError),
    /// Storage engine unreachable.
    Connection(String),
    /// One or more drop/create requests were rejected.
    IndexBuild { failed: usize },
    /// Report could not be written.
    Output(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => EXIT_USAGE,
            CliError::Connection(_) => EXIT_CONNECTION,
            CliError::IndexBuild { .. } | CliError::Output(_) => EXIT_INDEX_BUILD,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "error: {e}"),
            CliError::Connection(msg) => write!(f, "error: {msg}"),
            CliError::IndexBuild { failed } => {
                write!(f, "error: {failed} index operation(s) failed")
            }
            CliError::Output(msg) => write!(f, "error: {msg}"),
        }
    }
}

impl fmt::Debug for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<ReconcileError> for CliError {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::Connection { .. } => CliError::Connection(e.to_string()),
            ReconcileError::IndexBuild { failed, .. } => CliError::IndexBuild { failed },
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(format!("JSON encode error: {e}"))
    }
}

/// Print error and exit with the appropriate code.
pub fn exit_with_error(err: CliError) -> ! {
    eprintln!("{err}");
    process::exit(err.exit_code())
}

pub type CliResult<T> = std::result::Result<T, CliError>;

//! Error types for Seagull.
//!
//! Library crates use [`SeagullError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` and maps each variant to its own
//! process exit code via [`SeagullError::exit_code`].

use std::path::PathBuf;

/// Top-level error type for all Seagull operations.
#[derive(Debug, thiserror::Error)]
pub enum SeagullError {
    /// The requested project identifier is not in the registry.
    #[error("{id} is not a valid project identifier. Valid projects are: {}", .known.join(", "))]
    UnknownProject { id: String, known: Vec<String> },

    /// The project exists but its `build.yml` is absent or unreadable.
    #[error("project {project} does not have a readable build configuration at {path:?}: {source}")]
    MissingConfiguration {
        project: String,
        path: PathBuf,
        source: std::io::Error,
    },

    /// The project's `build.yml` exists but does not match the schema.
    #[error("invalid build configuration at {path:?}: {message}")]
    InvalidConfiguration { path: PathBuf, message: String },

    /// Registry loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A composition step needed the most recent version date, but the
    /// version history is empty.
    #[error("project {project} has no version history; the template needs a most-recent date")]
    MissingVersionHistory { project: String },

    /// The `<slug>.template` file does not exist.
    #[error("template not found at {path:?}")]
    MissingTemplate { path: PathBuf },

    /// The template contains a placeholder token nobody knows how to expand.
    #[error("template contains unrecognized placeholder {token}")]
    UnexpandedPlaceholder { token: String },

    /// An external converter or toolchain pass exited unsuccessfully.
    #[error("{stage} failed ({})", describe_status(.status))]
    BuildFailed { stage: String, status: Option<i32> },

    /// An external program could not be started at all.
    #[error("failed to run `{program}`: {source}. Is it installed?")]
    ToolUnavailable {
        program: String,
        source: std::io::Error,
    },

    /// Filesystem subscription error in watch mode.
    #[error("watch error: {0}")]
    Watch(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SeagullError>;

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

impl SeagullError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a build failure for the named stage.
    pub fn build_failed(stage: impl Into<String>, status: Option<i32>) -> Self {
        Self::BuildFailed {
            stage: stage.into(),
            status,
        }
    }

    /// Process exit code the CLI uses when this error ends a command.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnknownProject { .. } => 2,
            Self::MissingConfiguration { .. } => 3,
            Self::InvalidConfiguration { .. } | Self::Config { .. } => 4,
            Self::MissingTemplate { .. } => 5,
            Self::MissingVersionHistory { .. } => 6,
            Self::UnexpandedPlaceholder { .. } => 7,
            Self::BuildFailed { .. } | Self::ToolUnavailable { .. } => 8,
            Self::Watch(_) => 9,
            Self::Io { .. } => 10,
        }
    }
}

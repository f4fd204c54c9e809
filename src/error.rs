//! Error types for config loading and build operations.
//!
//! Loading errors (`ConfigError`) abort the whole pipeline. Build errors
//! (`BuildError`) are isolated per configuration by the runner and never
//! escalate past it. Both end up as printed reports and an exit code, so the
//! top level [`Error`] only carries what can stop the CLI itself.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for all CLI operations
#[derive(Error, Debug)]
pub enum Error {
    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Command execution failed
    #[error("Command execution failed: {command} - {reason}")]
    ExecutionFailed {
        /// Command that failed
        command: String,
        /// Reason for the error
        reason: String,
    },
}

/// Errors raised while turning a config file into build configurations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The entry file or one of its imports could not be resolved or parsed.
    #[error("failed to bundle config file {path}: {reason}")]
    Bundle {
        /// Config file being bundled
        path: PathBuf,
        /// Diagnostics reported by the bundler
        reason: String,
    },

    /// The bundled config threw while running.
    #[error("failed to evaluate config file {path}: {reason}")]
    Evaluation {
        /// Config file being evaluated
        path: PathBuf,
        /// Error output of the runtime
        reason: String,
    },

    /// The config ran but its export is not an object or array of objects.
    #[error("config must export an object.")]
    InvalidExport {
        /// Config file being evaluated
        path: PathBuf,
    },

    /// A hook field holds something other than a shell command.
    #[error("invalid `{field}` hook: {reason}")]
    InvalidHook {
        /// Option name
        field: String,
        /// What was wrong with it
        reason: String,
    },

    /// Filesystem failure while staging or cleaning up evaluation files.
    #[error("IO error while loading {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A required executable could not be located.
    #[error(transparent)]
    Tool(#[from] ToolNotFound),
}

impl ConfigError {
    /// Config file the error refers to, when known.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Bundle { path, .. }
            | Self::Evaluation { path, .. }
            | Self::InvalidExport { path }
            | Self::Io { path, .. } => Some(path),
            Self::InvalidHook { .. } | Self::Tool(_) => None,
        }
    }
}

/// Errors raised by a single build. Reported per configuration.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The bundler rejected the build.
    #[error("{message}")]
    Failed {
        /// First error reported by the bundler
        message: String,
        /// Full diagnostic output
        details: String,
    },

    /// An option cannot be passed to the bundler command line.
    #[error("option `{key}` is not supported by the esbuild command line: {reason}")]
    UnsupportedOption {
        /// Option name as written in the config
        key: String,
        /// Why it was rejected
        reason: String,
    },

    /// The bundler process could not be spawned or awaited.
    #[error("failed to run esbuild: {0}")]
    Process(#[from] std::io::Error),

    /// The metafile written by the bundler could not be parsed.
    #[error("failed to read esbuild metafile: {0}")]
    Metafile(#[from] serde_json::Error),
}

impl BuildError {
    /// Full report printed under the failure banner.
    pub fn report(&self) -> String {
        match self {
            Self::Failed { message, details } if !details.trim().is_empty() => {
                format!("Error: {}\n{}", message, details.trim_end())
            }
            other => format!("Error: {}", other),
        }
    }
}

/// A required external executable is missing.
#[derive(Error, Debug)]
#[error("{tool} executable not found: {reason}")]
pub struct ToolNotFound {
    /// Executable name
    pub tool: &'static str,
    /// Where it was looked for
    pub reason: String,
}

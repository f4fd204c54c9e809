//! Config file driven command line for esbuild.
//!
//! Finds an `esbuild.config.*` file, compiles and evaluates it with esbuild
//! and node, and runs every build configuration it exports, optionally in
//! watch mode with success and failure hooks.
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod cli;
pub mod config;
pub mod error;
pub mod runner;
pub mod tool;
pub mod utils;

// Re-export commonly used types
pub use config::{BuildConfig, LoadConfigResult, load_config_from_file};
pub use error::{BuildError, CliError, ConfigError, Error, Result};
pub use runner::{BuildOutput, Hook, HookEvent, run_all};
pub use tool::Toolchain;

//! Command line argument parsing and validation.

use crate::tool::Toolchain;
use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Long flags of our own; any other leading `--flag` belongs to esbuild.
const OWN_LONG_FLAGS: &[&str] = &["--config", "--version", "--help"];

/// Config file driven CLI for esbuild
#[derive(Parser, Debug)]
#[command(
    name = "esbuild-cli",
    version,
    about = "Config file driven CLI for esbuild",
    long_about = "Runs esbuild with options read from a config file.

Looks for esbuild.config.{mts,cts,ts,mjs,cjs,js} in the current directory
unless --config names another file. A config may export one options object
or an array of them; each runs as a separate build.

Usage:
  esbuild-cli                       build with the discovered config file
  esbuild-cli build -c my.config.ts build with an explicit config file
  esbuild-cli init --typescript     scaffold esbuild.config.ts
  esbuild-cli app.ts --bundle       any other arguments go to esbuild as-is
  esbuild-cli --bundle app.ts       including ones that start with a flag",
    disable_version_flag = true,
    args_conflicts_with_subcommands = true
)]
pub struct Args {
    /// Display version number
    #[arg(short = 'v', long)]
    pub version: bool,

    /// Use the specified config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands. Unknown ones are forwarded to esbuild.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a config file for esbuild
    Init(InitArgs),

    /// Perform build with options in config file
    Build(BuildArgs),

    /// Forward arguments to esbuild unchanged
    #[command(external_subcommand)]
    Esbuild(Vec<String>),
}

/// Options for `init`.
#[derive(clap::Args, Debug, Default)]
pub struct InitArgs {
    /// Create esbuild.config.ts instead of esbuild.config.js
    #[arg(long)]
    pub typescript: bool,

    /// Entry point written to the config file
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<String>,

    /// Output file written to the config file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<String>,
}

/// Options for `build`.
#[derive(clap::Args, Debug, Default)]
pub struct BuildArgs {
    /// Use the specified config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse_from_argv(std::env::args_os())
    }

    /// Parses `argv`, program name first.
    ///
    /// A command line that starts with an esbuild flag such as `--bundle`
    /// is forwarded whole; clap would otherwise reject the unknown flag.
    pub fn parse_from_argv<I, T>(argv: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
        match argv.get(1).and_then(|arg| arg.to_str()) {
            Some(first) if is_esbuild_flag(first) => Self {
                version: false,
                config: None,
                command: Some(Command::Esbuild(
                    argv[1..]
                        .iter()
                        .map(|arg| arg.to_string_lossy().into_owned())
                        .collect(),
                )),
            },
            _ => Self::parse_from(argv),
        }
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        let config = match &self.command {
            Some(Command::Build(build)) => build.config.as_deref(),
            _ => self.config.as_deref(),
        };
        if config.is_some_and(|path| path.as_os_str().is_empty()) {
            return Err("Config file path cannot be empty".to_string());
        }

        if let Some(Command::Init(init)) = &self.command {
            for (flag, value) in [("--input", &init.input), ("--output", &init.output)] {
                if value.as_deref().is_some_and(|value| value.trim().is_empty()) {
                    return Err(format!("{} cannot be empty", flag));
                }
            }
        }

        Ok(())
    }
}

fn is_esbuild_flag(arg: &str) -> bool {
    arg.starts_with("--")
        && arg != "--"
        && !OWN_LONG_FLAGS.iter().any(|flag| {
            arg.strip_prefix(flag)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('='))
        })
}

/// State shared by every command once the arguments are accepted
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Output manager for colored terminal output
    output: super::OutputManager,

    /// esbuild and node locations
    toolchain: Toolchain,

    /// Directory the CLI was started in
    working_dir: PathBuf,
}

impl RuntimeConfig {
    pub fn new(output: super::OutputManager, toolchain: Toolchain, working_dir: PathBuf) -> Self {
        Self {
            output,
            toolchain,
            working_dir,
        }
    }

    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}

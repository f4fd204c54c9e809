//! Command line interface for esbuild-cli.
//!
//! Parses arguments, locates esbuild and dispatches to a command. Every
//! command resolves to a process exit code.

mod args;
pub mod commands;
mod output;

pub use args::{Args, BuildArgs, Command, InitArgs, RuntimeConfig};
pub use output::OutputManager;

use crate::error::{CliError, Result};
use crate::tool::{Toolchain, install_notice};

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    run_with(Args::parse_args()).await
}

/// Runs already parsed arguments.
pub async fn run_with(args: Args) -> Result<i32> {
    if args.version {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(0);
    }
    args.validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;

    let output = OutputManager::new();
    let working_dir = std::env::current_dir()?;
    let toolchain = match Toolchain::detect(&working_dir) {
        Ok(toolchain) => toolchain,
        Err(e) => {
            log::debug!("{}", e);
            output.error(&install_notice());
            return Ok(1);
        }
    };
    let runtime_config = RuntimeConfig::new(output, toolchain, working_dir);

    match args.command {
        Some(Command::Init(init)) => commands::init::execute(&init, &runtime_config).await,
        Some(Command::Build(build)) => {
            commands::build::execute(build.config.as_deref(), &runtime_config).await
        }
        Some(Command::Esbuild(argv)) => {
            commands::passthrough::execute(&argv, &runtime_config).await
        }
        None => commands::build::execute(args.config.as_deref(), &runtime_config).await,
    }
}

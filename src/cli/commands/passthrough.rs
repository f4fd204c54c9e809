//! Arguments that are not a known subcommand go straight to esbuild.

use crate::cli::RuntimeConfig;
use crate::error::{CliError, Result};
use std::process::Stdio;
use tokio::process::Command;

/// Runs esbuild with `argv` and the terminal attached, returning its exit
/// code.
pub async fn execute(argv: &[String], runtime_config: &RuntimeConfig) -> Result<i32> {
    let esbuild = runtime_config.toolchain().esbuild();
    log::debug!("forwarding to {}: {}", esbuild.display(), argv.join(" "));

    let status = Command::new(esbuild)
        .args(argv)
        .current_dir(runtime_config.working_dir())
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|e| CliError::ExecutionFailed {
            command: format!("esbuild {}", argv.join(" ")),
            reason: e.to_string(),
        })?;

    Ok(status.code().unwrap_or(1))
}

//! esbuild process execution for a single build.

use super::diagnostics;
use super::flags::Invocation;
use crate::error::BuildError;
use path_absolutize::Absolutize;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Log level used when the config does not choose one.
pub const DEFAULT_LOG_LEVEL: &str = "warning";

/// Result of a successful build.
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    /// Files written by esbuild, in path order
    pub outputs: Vec<OutputArtifact>,

    /// Warnings esbuild printed for this build
    pub warnings: String,

    /// Wall time of the esbuild process
    pub duration: Duration,
}

/// One written output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    /// Absolute, normalized path
    pub path: String,

    /// Size in bytes
    pub bytes: u64,
}

#[derive(Deserialize)]
struct Metafile {
    #[serde(default)]
    outputs: BTreeMap<String, MetafileOutput>,
}

#[derive(Deserialize)]
struct MetafileOutput {
    bytes: u64,
}

/// Prepares the esbuild command shared by one-shot and watch builds.
///
/// Adds the metafile and the log level on top of the translated options.
pub fn esbuild_command(
    esbuild: &Path,
    invocation: &Invocation,
    default_dir: &Path,
    metafile: &Path,
    log_level: &str,
) -> Command {
    let mut cmd = Command::new(esbuild);
    cmd.args(&invocation.args)
        .arg(format!("--metafile={}", metafile.display()))
        .arg(format!("--log-level={}", log_level))
        .current_dir(working_dir(invocation, default_dir))
        .stdin(Stdio::null());

    if let Some(node_path) = &invocation.node_path {
        cmd.env("NODE_PATH", node_path);
    }
    cmd
}

/// Directory esbuild runs in: `absWorkingDir` or the caller's directory.
pub fn working_dir(invocation: &Invocation, default_dir: &Path) -> PathBuf {
    invocation
        .working_dir
        .clone()
        .unwrap_or_else(|| default_dir.to_path_buf())
}

/// Runs one build to completion.
pub async fn build_once(
    esbuild: &Path,
    invocation: &Invocation,
    default_dir: &Path,
) -> Result<BuildOutput, BuildError> {
    let scratch = tempfile::Builder::new()
        .prefix("esbuild-cli-build-")
        .tempdir()?;
    let metafile = scratch.path().join("meta.json");
    let log_level = invocation.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL);

    log::debug!("esbuild {}", invocation.args.join(" "));
    let start = Instant::now();
    let output = esbuild_command(esbuild, invocation, default_dir, &metafile, log_level)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;
    let duration = start.elapsed();

    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !output.status.success() {
        return Err(diagnostics::build_failure(&stderr, output.status.code()));
    }

    let outputs = match read_outputs(&metafile, &working_dir(invocation, default_dir)) {
        Ok(outputs) => outputs,
        Err(BuildError::Process(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("esbuild wrote no metafile, reporting no outputs");
            Vec::new()
        }
        Err(e) => return Err(e),
    };
    Ok(BuildOutput {
        outputs,
        warnings: if diagnostics::has_warnings(&stderr) { stderr } else { String::new() },
        duration,
    })
}

/// Output files listed in a metafile, resolved against `working_dir`.
pub fn read_outputs(metafile: &Path, working_dir: &Path) -> Result<Vec<OutputArtifact>, BuildError> {
    let text = std::fs::read_to_string(metafile)?;
    let metafile: Metafile = serde_json::from_str(&text)?;
    Ok(metafile
        .outputs
        .into_iter()
        .map(|(path, output)| OutputArtifact {
            path: resolve_output_path(&path, working_dir),
            bytes: output.bytes,
        })
        .collect())
}

pub(super) fn resolve_output_path(path: &str, working_dir: &Path) -> String {
    let joined = working_dir.join(path);
    let absolute = joined
        .absolutize()
        .map(|p| p.into_owned())
        .unwrap_or(joined);
    crate::utils::normalize_path(&absolute)
}

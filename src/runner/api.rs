//! Builds run by the esbuild JavaScript API in the config's node process.
//!
//! Used when the config's session can load the esbuild package. Options reach
//! esbuild unchanged, so plugins, `write: false` and the other options that
//! have no command line spelling work here.

use super::diagnostics;
use super::process::{BuildOutput, OutputArtifact, resolve_output_path};
use super::watch::{RebuildHooks, Watcher, report_rebuild};
use crate::cli::RuntimeConfig;
use crate::config::session::{BuildReport, Reply, Request};
use crate::config::ConfigSource;
use crate::error::BuildError;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;

/// Runs one build of the config at `source`.
pub async fn build_once(
    source: &ConfigSource,
    runtime_config: &RuntimeConfig,
) -> Result<BuildOutput, BuildError> {
    let start = Instant::now();
    let mut replies = source
        .session
        .request(Request::Build {
            index: source.index,
        })
        .await?;

    next_build(&mut replies, start, runtime_config.working_dir())
        .await
        .unwrap_or_else(|| Err(stopped("the build finished")))
}

/// Starts an esbuild watch context and waits for the initial build.
///
/// Later builds are reported by the returned watcher until the context stops.
pub async fn start(
    source: &ConfigSource,
    hooks: RebuildHooks,
    runtime_config: &RuntimeConfig,
) -> Result<(Result<BuildOutput, BuildError>, Watcher), BuildError> {
    let start = Instant::now();
    let mut replies = source
        .session
        .request(Request::Watch {
            index: source.index,
        })
        .await?;

    let initial = next_build(&mut replies, start, runtime_config.working_dir())
        .await
        .unwrap_or_else(|| Err(stopped("the initial build finished")));

    let session = source.session.clone();
    let runtime_config = runtime_config.clone();
    let handle = tokio::spawn(async move {
        let _session = session;
        loop {
            let started = Instant::now();
            let Some(outcome) =
                next_build(&mut replies, started, runtime_config.working_dir()).await
            else {
                break;
            };
            report_rebuild(&outcome, &hooks, &runtime_config).await;
        }
        log::debug!("esbuild watch context stopped");
    });

    Ok((initial, Watcher::new(handle)))
}

/// Waits for the next finished build. `None` once the session stops
/// reporting builds for this request.
async fn next_build(
    replies: &mut UnboundedReceiver<Reply>,
    start: Instant,
    working_dir: &Path,
) -> Option<Result<BuildOutput, BuildError>> {
    loop {
        match replies.recv().await? {
            Reply::Built { report } => return Some(outcome(report, start.elapsed(), working_dir)),
            Reply::WatchStopped => return None,
            other => log::debug!("ignoring reply while building: {:?}", other),
        }
    }
}

fn outcome(
    report: BuildReport,
    elapsed: Duration,
    working_dir: &Path,
) -> Result<BuildOutput, BuildError> {
    if !report.ok {
        return Err(failure(report));
    }

    let mut outputs: Vec<OutputArtifact> = report
        .outputs
        .into_iter()
        .map(|output| OutputArtifact {
            path: resolve_output_path(&output.path, working_dir),
            bytes: output.bytes,
        })
        .collect();
    outputs.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(BuildOutput {
        outputs,
        warnings: report.warnings,
        duration: report
            .duration_ms
            .map(|ms| Duration::from_secs_f64(ms / 1000.0))
            .unwrap_or(elapsed),
    })
}

/// Same shape as a command line failure: first error as the message, the
/// rest of esbuild's report as details.
fn failure(report: BuildReport) -> BuildError {
    if diagnostics::has_errors(&report.details) {
        return diagnostics::build_failure(&report.details, None);
    }
    BuildError::Failed {
        message: report.message,
        details: report.details,
    }
}

fn stopped(waiting_for: &str) -> BuildError {
    BuildError::Failed {
        message: format!("config process exited before {}", waiting_for),
        details: String::new(),
    }
}

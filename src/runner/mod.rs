//! Build execution for loaded configurations.
//!
//! Configurations build one after another in export order. Each build ends
//! in success or failure: hooks run first, then the outcome is printed.
//! A failing build never stops the remaining ones.
//!
//! Configs loaded from a file build through the esbuild JavaScript API when
//! their node process can load the esbuild package; everything else runs the
//! esbuild executable with translated flags.

mod api;
pub mod diagnostics;
pub mod flags;
mod hooks;
mod process;
mod watch;

pub use hooks::{Hook, HookEvent, HookFn, ScriptHook};
pub use process::{BuildOutput, OutputArtifact, build_once};
pub use watch::{RebuildHooks, Watcher};

use crate::cli::RuntimeConfig;
use crate::config::{BuildConfig, WatchMode};
use crate::error::BuildError;
use std::time::Instant;

/// Outcome of one configuration's initial build.
pub struct BuildRun {
    pub outcome: Result<BuildOutput, BuildError>,

    /// Present in watch mode, whether or not the first build succeeded
    pub watcher: Option<Watcher>,
}

/// Runs every configuration in order and reports each outcome.
///
/// Returns once all one-shot builds are done and every watcher has stopped.
pub async fn run_all(configs: &[BuildConfig], runtime_config: &RuntimeConfig) {
    let mut watchers = Vec::new();

    for config in configs {
        let start = Instant::now();
        let run = build(config, runtime_config).await;
        watchers.extend(run.watcher);
        match run.outcome {
            Ok(output) => print_success(runtime_config, &output, start),
            Err(error) => print_failure(runtime_config, &error),
        }
    }

    for watcher in watchers {
        watcher.wait().await;
    }
}

/// Builds one configuration and fires its success or failure hook.
pub async fn build(config: &BuildConfig, runtime_config: &RuntimeConfig) -> BuildRun {
    let dir = runtime_config.working_dir();
    let run = start_build(config, runtime_config).await;

    match &run.outcome {
        Ok(output) => {
            if let Some(hook) = config.on_build_success() {
                hook.invoke(HookEvent::Success(output), dir).await;
            }
        }
        Err(error) => {
            if let Some(hook) = config.on_build_failure() {
                hook.invoke(HookEvent::Failure(error), dir).await;
            }
        }
    }

    run
}

async fn start_build(config: &BuildConfig, runtime_config: &RuntimeConfig) -> BuildRun {
    if let Some(source) = config.source().filter(|source| source.session.api_available()) {
        log::debug!("building config #{} through the esbuild API", source.index);
        let (outcome, watcher) = match config.watch() {
            None => (api::build_once(source, runtime_config).await, None),
            Some(watch_mode) => {
                match api::start(source, rebuild_hooks(config, watch_mode), runtime_config).await {
                    Ok((outcome, watcher)) => (outcome, Some(watcher)),
                    Err(error) => (Err(error), None),
                }
            }
        };
        return BuildRun { outcome, watcher };
    }

    let invocation = match flags::build_invocation(config.options()) {
        Ok(invocation) => invocation,
        Err(error) => {
            return BuildRun {
                outcome: Err(error),
                watcher: None,
            };
        }
    };

    let Some(watch_mode) = config.watch() else {
        let outcome = build_once(
            runtime_config.toolchain().esbuild(),
            &invocation,
            runtime_config.working_dir(),
        )
        .await;
        return BuildRun {
            outcome,
            watcher: None,
        };
    };

    // esbuild keeps watching after a failed first build, so the watcher is
    // kept either way.
    match watch::start(&invocation, rebuild_hooks(config, watch_mode), runtime_config).await {
        Ok((outcome, watcher)) => BuildRun {
            outcome,
            watcher: Some(watcher),
        },
        Err(error) => BuildRun {
            outcome: Err(error),
            watcher: None,
        },
    }
}

fn rebuild_hooks(config: &BuildConfig, watch_mode: &WatchMode) -> RebuildHooks {
    RebuildHooks {
        on_build_success: config.on_build_success().cloned(),
        on_build_failure: config.on_build_failure().cloned(),
        on_rebuild: watch_mode.on_rebuild.clone(),
    }
}

fn print_success(runtime_config: &RuntimeConfig, output: &BuildOutput, start: Instant) {
    print_warnings(runtime_config, output);
    let out = runtime_config.output();
    out.success(&format!(
        "[esbuild] Built in {:.2}ms",
        start.elapsed().as_secs_f64() * 1000.0
    ));
    for artifact in &output.outputs {
        out.println(&format!("    {}  {}b", artifact.path, artifact.bytes));
    }
}

pub(crate) fn print_warnings(runtime_config: &RuntimeConfig, output: &BuildOutput) {
    if !output.warnings.trim().is_empty() {
        runtime_config.output().eprintln(output.warnings.trim_end());
    }
}

pub(crate) fn print_failure(runtime_config: &RuntimeConfig, error: &BuildError) {
    let out = runtime_config.output();
    out.error("[esbuild] Build failure");
    out.error(&format!("  {}", error));
    out.eprintln(&error.report());
}

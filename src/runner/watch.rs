//! Persistent rebuild mode.
//!
//! esbuild runs with `--watch=forever` and announces every build on stderr
//! with `[watch] build started` / `[watch] build finished` lines. The lines
//! between the two markers decide whether that build failed. The first build
//! is handed back to the runner; every later one is reported here.
//!
//! The markers are only printed at `info`, so a config's own `logLevel` does
//! not apply while watching.

use super::diagnostics;
use super::flags::Invocation;
use super::hooks::{Hook, HookEvent};
use super::process::{BuildOutput, esbuild_command, read_outputs, working_dir};
use crate::cli::RuntimeConfig;
use crate::error::BuildError;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const BUILD_STARTED: &str = "[watch] build started";
const BUILD_FINISHED: &str = "[watch] build finished";

/// Lowest level at which esbuild prints the watch markers.
const WATCH_LOG_LEVEL: &str = "info";

/// Hooks fired on every rebuild, wrapper output first.
#[derive(Debug, Clone, Default)]
pub struct RebuildHooks {
    pub on_build_success: Option<Hook>,
    pub on_build_failure: Option<Hook>,
    /// The user's `watch.onRebuild`, always last
    pub on_rebuild: Option<Hook>,
}

/// A running watch build.
pub struct Watcher {
    handle: JoinHandle<()>,
}

impl Watcher {
    pub(super) fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }

    /// Waits until esbuild stops watching (normally never).
    pub async fn wait(self) {
        if let Err(e) = self.handle.await {
            log::warn!("watch task ended abnormally: {}", e);
        }
    }
}

/// Starts esbuild in watch mode and waits for the initial build.
///
/// Returns the initial outcome together with the watcher that keeps
/// reporting rebuilds. Errors before esbuild could be spawned are returned
/// directly.
pub async fn start(
    invocation: &Invocation,
    hooks: RebuildHooks,
    runtime_config: &RuntimeConfig,
) -> Result<(Result<BuildOutput, BuildError>, Watcher), BuildError> {
    let scratch = tempfile::Builder::new()
        .prefix("esbuild-cli-watch-")
        .tempdir()?;
    let metafile = scratch.path().join("meta.json");
    let cwd = working_dir(invocation, runtime_config.working_dir());
    let configured_level = invocation.log_level.as_deref();
    if let Some(level) = configured_level.filter(|level| *level != WATCH_LOG_LEVEL) {
        log::debug!(
            "logLevel \"{}\" is replaced by \"{}\" in watch mode",
            level,
            WATCH_LOG_LEVEL
        );
    }

    let mut child = esbuild_command(
        runtime_config.toolchain().esbuild(),
        invocation,
        runtime_config.working_dir(),
        &metafile,
        WATCH_LOG_LEVEL,
    )
    .arg("--watch=forever")
    .stdout(Stdio::null())
    .stderr(Stdio::piped())
    .kill_on_drop(true)
    .spawn()?;

    let stderr = child.stderr.take();
    let (initial_tx, initial_rx) = oneshot::channel();
    let runtime_config = runtime_config.clone();

    let handle = tokio::spawn(async move {
        let _scratch = scratch;
        let mut state = WatchState {
            initial: Some(initial_tx),
            pending: Vec::new(),
            started: Instant::now(),
            metafile,
            cwd,
        };

        if let Some(stderr) = stderr {
            let mut reader = BufReader::new(stderr);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) => {
                        log::debug!("esbuild watcher stderr closed: {}", e);
                        break;
                    }
                }
                // Paths in diagnostics are not guaranteed to be UTF-8.
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                if let Some(outcome) = state.observe(line) {
                    match state.initial.take() {
                        Some(initial) => {
                            let _ = initial.send(outcome);
                        }
                        None => report_rebuild(&outcome, &hooks, &runtime_config).await,
                    }
                }
            }
        }

        let status = child.wait().await;
        let code = status.as_ref().ok().and_then(|s| s.code());
        match state.initial.take() {
            Some(initial) => {
                let _ = initial.send(Err(diagnostics::build_failure(
                    &state.pending.join("\n"),
                    code,
                )));
            }
            None => log::warn!("esbuild watcher exited with status {:?}", code),
        }
    });

    let initial = initial_rx.await.unwrap_or_else(|_| {
        Err(BuildError::Failed {
            message: "esbuild watcher stopped before the initial build finished".to_string(),
            details: String::new(),
        })
    });

    Ok((initial, Watcher { handle }))
}

struct WatchState {
    initial: Option<oneshot::Sender<Result<BuildOutput, BuildError>>>,
    pending: Vec<String>,
    started: Instant,
    metafile: PathBuf,
    cwd: PathBuf,
}

impl WatchState {
    /// Feeds one stderr line; returns an outcome when a build finishes.
    fn observe(&mut self, line: String) -> Option<Result<BuildOutput, BuildError>> {
        if line.contains(BUILD_STARTED) {
            self.pending.clear();
            self.started = Instant::now();
            return None;
        }
        if !line.contains(BUILD_FINISHED) {
            self.pending.push(line);
            return None;
        }

        let text = std::mem::take(&mut self.pending).join("\n");
        let duration = self.started.elapsed();
        if diagnostics::has_errors(&text) {
            return Some(Err(diagnostics::build_failure(&text, None)));
        }

        let outputs = read_outputs(&self.metafile, &self.cwd).unwrap_or_else(|e| {
            log::debug!("no metafile after watch build: {}", e);
            Vec::new()
        });
        Some(Ok(BuildOutput {
            outputs,
            warnings: if diagnostics::has_warnings(&text) { text } else { String::new() },
            duration,
        }))
    }
}

pub(super) async fn report_rebuild(
    outcome: &Result<BuildOutput, BuildError>,
    hooks: &RebuildHooks,
    runtime_config: &RuntimeConfig,
) {
    let dir = runtime_config.working_dir();
    let event = match outcome {
        Err(error) => {
            super::print_failure(runtime_config, error);
            if let Some(hook) = &hooks.on_build_failure {
                hook.invoke(HookEvent::Failure(error), dir).await;
            }
            HookEvent::Failure(error)
        }
        Ok(output) => {
            super::print_warnings(runtime_config, output);
            runtime_config.output().success("[esbuild] Rebuilt");
            if let Some(hook) = &hooks.on_build_success {
                hook.invoke(HookEvent::Success(output), dir).await;
            }
            HookEvent::Success(output)
        }
    };

    if let Some(hook) = &hooks.on_rebuild {
        hook.invoke(event, dir).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> WatchState {
        WatchState {
            initial: None,
            pending: Vec::new(),
            started: Instant::now(),
            metafile: PathBuf::from("/nonexistent/meta.json"),
            cwd: PathBuf::from("/"),
        }
    }

    #[test]
    fn finished_without_errors_is_success() {
        let mut state = state();
        assert!(state.observe("[watch] build started (change: \"src/a.ts\")".into()).is_none());
        let outcome = state.observe("[watch] build finished".into()).unwrap();
        assert!(outcome.unwrap().outputs.is_empty());
    }

    #[test]
    fn errors_between_markers_fail_the_build() {
        let mut state = state();
        state.observe("[watch] build started (change: \"src/a.ts\")".into());
        state.observe("✘ [ERROR] Expected \";\" but found \"}\"".into());
        state.observe("".into());
        state.observe("    src/a.ts:3:0:".into());
        let outcome = state.observe("[watch] build finished".into()).unwrap();

        let err = outcome.unwrap_err();
        assert_eq!(err.to_string(), "Expected \";\" but found \"}\"");
    }

    #[test]
    fn each_build_starts_clean() {
        let mut state = state();
        state.observe("✘ [ERROR] stale".into());
        state.observe("[watch] build started (change: \"src/a.ts\")".into());
        let outcome = state
            .observe("[watch] build finished, watching for changes...".into())
            .unwrap();
        assert!(outcome.is_ok());
    }

    #[test]
    fn warnings_are_kept_on_success() {
        let mut state = state();
        state.observe("▲ [WARNING] Duplicate key \"a\" in object literal".into());
        let output = state.observe("[watch] build finished".into()).unwrap().unwrap();
        assert!(output.warnings.contains("Duplicate key"));
    }

    #[cfg(unix)]
    mod with_stub_esbuild {
        use super::*;
        use crate::cli::OutputManager;
        use crate::tool::Toolchain;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        /// esbuild stand-in that prints `stderr` and exits.
        fn runtime(dir: &TempDir, stderr: &str) -> RuntimeConfig {
            let esbuild = dir.path().join("esbuild");
            std::fs::write(&esbuild, format!("#!/bin/sh\ncat >&2 <<'EOF'\n{}EOF\n", stderr))
                .unwrap();
            std::fs::set_permissions(&esbuild, std::fs::Permissions::from_mode(0o755)).unwrap();
            RuntimeConfig::new(
                OutputManager::capturing(),
                Toolchain::new(esbuild, None),
                dir.path().to_path_buf(),
            )
        }

        fn recorder(out: &OutputManager, name: &'static str) -> Hook {
            let out = out.clone();
            Hook::callback(move |event| {
                let kind = match event {
                    HookEvent::Success(_) => "success",
                    HookEvent::Failure(_) => "failure",
                };
                out.println(&format!("{}:{}", name, kind));
            })
        }

        #[tokio::test]
        async fn rebuilds_report_banner_then_hooks_then_on_rebuild() {
            let dir = TempDir::new().unwrap();
            let runtime_config = runtime(
                &dir,
                "[watch] build finished, watching for changes...\n\
                 [watch] build started (change: \"src/a.ts\")\n\
                 ✘ [ERROR] Something broke\n\
                 [watch] build finished\n\
                 [watch] build started (change: \"src/a.ts\")\n\
                 [watch] build finished\n",
            );
            let out = runtime_config.output().clone();
            let hooks = RebuildHooks {
                on_build_success: Some(recorder(&out, "config")),
                on_build_failure: Some(recorder(&out, "config")),
                on_rebuild: Some(recorder(&out, "onRebuild")),
            };

            let (initial, watcher) = start(&Invocation::default(), hooks, &runtime_config)
                .await
                .unwrap();
            assert!(initial.unwrap().outputs.is_empty());
            watcher.wait().await;

            assert_eq!(
                out.captured(),
                vec![
                    "[esbuild] Build failure",
                    "  Something broke",
                    "Error: Something broke",
                    "config:failure",
                    "onRebuild:failure",
                    "[esbuild] Rebuilt",
                    "config:success",
                    "onRebuild:success",
                ]
            );
        }

        #[tokio::test]
        async fn failed_initial_build_is_returned_not_reported() {
            let dir = TempDir::new().unwrap();
            let runtime_config = runtime(
                &dir,
                "✘ [ERROR] Could not resolve \"./missing\"\n\
                 [watch] build finished, watching for changes...\n",
            );

            let (initial, watcher) =
                start(&Invocation::default(), RebuildHooks::default(), &runtime_config)
                    .await
                    .unwrap();
            watcher.wait().await;

            assert_eq!(
                initial.unwrap_err().to_string(),
                "Could not resolve \"./missing\""
            );
            assert!(runtime_config.output().captured().is_empty());
        }

        #[tokio::test]
        async fn exit_before_first_build_fails_it() {
            let dir = TempDir::new().unwrap();
            let runtime_config = runtime(&dir, "✘ [ERROR] Invalid option in watch mode\n");

            let (initial, watcher) =
                start(&Invocation::default(), RebuildHooks::default(), &runtime_config)
                    .await
                    .unwrap();
            watcher.wait().await;

            assert_eq!(initial.unwrap_err().to_string(), "Invalid option in watch mode");
        }

        #[tokio::test]
        async fn invalid_utf8_does_not_stop_the_watcher() {
            let dir = TempDir::new().unwrap();
            let esbuild = dir.path().join("esbuild");
            std::fs::write(
                &esbuild,
                "#!/bin/sh\n\
                 echo '[watch] build finished' >&2\n\
                 printf '\\377\\376 src/caf\\351.ts changed\\n' >&2\n\
                 echo '[watch] build started' >&2\n\
                 echo '[watch] build finished' >&2\n",
            )
            .unwrap();
            std::fs::set_permissions(&esbuild, std::fs::Permissions::from_mode(0o755)).unwrap();
            let runtime_config = RuntimeConfig::new(
                OutputManager::capturing(),
                Toolchain::new(esbuild, None),
                dir.path().to_path_buf(),
            );

            let (initial, watcher) =
                start(&Invocation::default(), RebuildHooks::default(), &runtime_config)
                    .await
                    .unwrap();
            assert!(initial.is_ok());
            watcher.wait().await;

            assert_eq!(runtime_config.output().captured(), vec!["[esbuild] Rebuilt"]);
        }
    }
}

//! Build outcome hooks.
//!
//! Config files declare hooks as functions, called inside the config's own
//! node process, or as shell commands. Library callers may attach Rust
//! closures instead. Hooks observe outcomes only: a failing hook is logged
//! and never changes how the build is reported.

use super::BuildOutput;
use crate::config::{ConfigSession, ConfigSource};
use crate::error::BuildError;
use serde_json::{Value, json};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;

/// Outcome delivered to a hook.
#[derive(Debug, Clone, Copy)]
pub enum HookEvent<'a> {
    Success(&'a BuildOutput),
    Failure(&'a BuildError),
}

impl HookEvent<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Failure(_) => "failure",
        }
    }

    /// The outcome as sent to a JavaScript hook.
    fn to_json(&self) -> Value {
        match self {
            Self::Success(output) => json!({
                "ok": true,
                "outputs": output
                    .outputs
                    .iter()
                    .map(|artifact| json!({ "path": artifact.path, "bytes": artifact.bytes }))
                    .collect::<Vec<_>>(),
            }),
            Self::Failure(error) => {
                let details = match error {
                    BuildError::Failed { details, .. } => details.as_str(),
                    _ => "",
                };
                json!({ "ok": false, "message": error.to_string(), "details": details })
            }
        }
    }
}

/// A function exported by a config file, e.g. `onBuildSuccess`.
#[derive(Debug, Clone)]
pub struct ScriptHook {
    session: ConfigSession,
    index: usize,
    field: String,
}

impl ScriptHook {
    /// Hook at `field` (`onBuildSuccess`, `watch.onRebuild`, ...) of the
    /// config at `source`.
    pub fn new(source: &ConfigSource, field: &str) -> Self {
        Self {
            session: source.session.clone(),
            index: source.index,
            field: field.to_string(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

/// Closure form of a hook.
pub type HookFn = Arc<dyn Fn(&HookEvent<'_>) + Send + Sync>;

/// A user hook attached to a build configuration.
#[derive(Clone)]
pub enum Hook {
    /// Shell command run through the platform shell.
    ///
    /// Receives `ESBUILD_CLI_EVENT` (`success` or `failure`) plus
    /// `ESBUILD_CLI_OUTPUTS` (newline separated paths) on success or
    /// `ESBUILD_CLI_ERROR` on failure.
    Command(String),

    /// In-process callback.
    Callback(HookFn),

    /// JavaScript function from the config file.
    ///
    /// One-shot hooks get the esbuild result or error; `watch.onRebuild`
    /// gets `(error, result)`.
    Script(ScriptHook),
}

impl Hook {
    /// Wraps a closure as a hook.
    pub fn callback(f: impl Fn(&HookEvent<'_>) + Send + Sync + 'static) -> Self {
        Self::Callback(Arc::new(f))
    }

    /// Invokes the hook, logging instead of propagating any failure.
    pub async fn invoke(&self, event: HookEvent<'_>, working_dir: &Path) {
        match self {
            Self::Callback(f) => f(&event),
            Self::Command(command) => run_command(command, &event, working_dir).await,
            Self::Script(script) => {
                log::debug!("calling {} hook `{}`", event.name(), script.field());
                script
                    .session
                    .run_hook(script.index, &script.field, event.to_json())
                    .await;
            }
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(command) => f.debug_tuple("Command").field(command).finish(),
            Self::Callback(_) => f.write_str("Callback(..)"),
            Self::Script(script) => f.debug_tuple("Script").field(&script.field).finish(),
        }
    }
}

async fn run_command(command: &str, event: &HookEvent<'_>, working_dir: &Path) {
    let mut cmd = shell(command);
    cmd.current_dir(working_dir)
        .env("ESBUILD_CLI_EVENT", event.name());

    match event {
        HookEvent::Success(output) => {
            let outputs: Vec<&str> = output.outputs.iter().map(|a| a.path.as_str()).collect();
            cmd.env("ESBUILD_CLI_OUTPUTS", outputs.join("\n"));
        }
        HookEvent::Failure(error) => {
            cmd.env("ESBUILD_CLI_ERROR", error.to_string());
        }
    }

    log::debug!("running {} hook: {}", event.name(), command);
    match cmd.status().await {
        Ok(status) if status.success() => {}
        Ok(status) => log::warn!(
            "{} hook `{}` exited with status {:?}",
            event.name(),
            command,
            status.code()
        ),
        Err(e) => log::warn!("failed to run {} hook `{}`: {}", event.name(), command, e),
    }
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(not(windows))]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn callback_receives_event() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let hook = Hook::callback(move |event| {
            sink.lock().unwrap().push(event.name());
        });

        let output = BuildOutput::default();
        hook.invoke(HookEvent::Success(&output), Path::new(".")).await;
        let error = BuildError::Failed {
            message: "boom".into(),
            details: String::new(),
        };
        hook.invoke(HookEvent::Failure(&error), Path::new(".")).await;

        assert_eq!(*seen.lock().unwrap(), vec!["success", "failure"]);
    }

    #[test]
    fn outcomes_serialize_for_javascript_hooks() {
        let output = BuildOutput {
            outputs: vec![super::super::OutputArtifact {
                path: "/app/out.js".into(),
                bytes: 31,
            }],
            ..Default::default()
        };
        assert_eq!(
            HookEvent::Success(&output).to_json(),
            json!({ "ok": true, "outputs": [{ "path": "/app/out.js", "bytes": 31 }] })
        );

        let error = BuildError::Failed {
            message: "Could not resolve \"./missing\"".into(),
            details: "src/index.ts:1:18:".into(),
        };
        let failure = HookEvent::Failure(&error).to_json();
        assert_eq!(failure["ok"], false);
        assert_eq!(failure["message"], "Could not resolve \"./missing\"");
        assert_eq!(failure["details"], "src/index.ts:1:18:");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_hook_sees_event_environment() {
        let dir = tempfile::TempDir::new().unwrap();
        let hook = Hook::Command("printf '%s' \"$ESBUILD_CLI_EVENT:$ESBUILD_CLI_ERROR\" > hook.txt".into());
        let error = BuildError::Failed {
            message: "bad flag".into(),
            details: String::new(),
        };

        hook.invoke(HookEvent::Failure(&error), dir.path()).await;

        let written = std::fs::read_to_string(dir.path().join("hook.txt")).unwrap();
        assert_eq!(written, "failure:bad flag");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_hook_is_contained() {
        let hook = Hook::Command("exit 3".into());
        hook.invoke(HookEvent::Success(&BuildOutput::default()), Path::new("."))
            .await;
    }
}

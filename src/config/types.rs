//! Build configuration as exported by a config file.

use super::session::ConfigSession;
use crate::error::ConfigError;
use crate::runner::{Hook, ScriptHook};
use serde_json::{Map, Value};

/// Key the evaluation harness uses to mark a JavaScript function value.
pub const FUNCTION_MARKER: &str = "__function__";

const ON_BUILD_SUCCESS: &str = "onBuildSuccess";
const ON_BUILD_FAILURE: &str = "onBuildFailure";
const WATCH: &str = "watch";
const ON_REBUILD: &str = "onRebuild";
const ON_REBUILD_PATH: &str = "watch.onRebuild";

/// One esbuild build: the passthrough option set plus wrapper hooks.
///
/// Options other than the hooks and `watch` are kept exactly as exported and
/// only interpreted when they are translated into esbuild flags.
#[derive(Debug, Clone, Default)]
pub struct BuildConfig {
    options: Map<String, Value>,
    watch: Option<WatchMode>,
    on_build_success: Option<Hook>,
    on_build_failure: Option<Hook>,
    source: Option<ConfigSource>,
}

/// The loaded module a config was exported from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub session: ConfigSession,

    /// Position in the exported array, 0 for a single object
    pub index: usize,
}

/// Persistent rebuild mode requested through the `watch` option.
#[derive(Debug, Clone, Default)]
pub struct WatchMode {
    /// The user's own `watch.onRebuild` hook, run after the wrapper's.
    pub on_rebuild: Option<Hook>,
}

impl BuildConfig {
    /// Creates a config from raw esbuild options.
    pub fn new(options: Map<String, Value>) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    /// Splits an evaluated config object into options, watch mode and hooks.
    ///
    /// Without a module to call back into, function hooks are dropped with a
    /// warning.
    pub fn from_object(options: Map<String, Value>) -> Result<Self, ConfigError> {
        Self::parse(options, None)
    }

    /// Like [`from_object`](Self::from_object) for `configs[index]` of a
    /// module still loaded in `session`. Function hooks become
    /// [`Hook::Script`] and builds may run through the esbuild API.
    pub fn from_module(
        options: Map<String, Value>,
        session: &ConfigSession,
        index: usize,
    ) -> Result<Self, ConfigError> {
        Self::parse(
            options,
            Some(ConfigSource {
                session: session.clone(),
                index,
            }),
        )
    }

    fn parse(
        mut options: Map<String, Value>,
        source: Option<ConfigSource>,
    ) -> Result<Self, ConfigError> {
        let source_ref = source.as_ref();
        let on_build_success =
            take_hook(&mut options, ON_BUILD_SUCCESS, ON_BUILD_SUCCESS, source_ref)?;
        let on_build_failure =
            take_hook(&mut options, ON_BUILD_FAILURE, ON_BUILD_FAILURE, source_ref)?;
        let watch = match options.remove(WATCH) {
            None | Some(Value::Null) | Some(Value::Bool(false)) => None,
            Some(Value::Bool(true)) => Some(WatchMode::default()),
            Some(Value::Object(mut watch)) => Some(WatchMode {
                on_rebuild: take_hook(&mut watch, ON_REBUILD, ON_REBUILD_PATH, source_ref)?,
            }),
            Some(other) => {
                return Err(ConfigError::InvalidHook {
                    field: WATCH.to_string(),
                    reason: format!("expected a boolean or an object, got {}", other),
                });
            }
        };

        Ok(Self {
            options,
            watch,
            on_build_success,
            on_build_failure,
            source,
        })
    }

    pub fn with_on_build_success(mut self, hook: Hook) -> Self {
        self.on_build_success = Some(hook);
        self
    }

    pub fn with_on_build_failure(mut self, hook: Hook) -> Self {
        self.on_build_failure = Some(hook);
        self
    }

    pub fn with_watch(mut self, watch: WatchMode) -> Self {
        self.watch = Some(watch);
        self
    }

    /// esbuild options, hooks and `watch` excluded.
    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    pub fn watch(&self) -> Option<&WatchMode> {
        self.watch.as_ref()
    }

    pub fn on_build_success(&self) -> Option<&Hook> {
        self.on_build_success.as_ref()
    }

    pub fn on_build_failure(&self) -> Option<&Hook> {
        self.on_build_failure.as_ref()
    }

    /// The module this config was exported from, if it is still loaded.
    pub fn source(&self) -> Option<&ConfigSource> {
        self.source.as_ref()
    }
}

/// True for the harness' stand-in for a JavaScript function.
pub fn is_function_marker(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|object| object.len() == 1 && object.contains_key(FUNCTION_MARKER))
}

/// Removes `key` from `options` as a hook. `path` names it inside the
/// config object, e.g. `watch.onRebuild`.
fn take_hook(
    options: &mut Map<String, Value>,
    key: &str,
    path: &str,
    source: Option<&ConfigSource>,
) -> Result<Option<Hook>, ConfigError> {
    match options.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(command)) if command.trim().is_empty() => Ok(None),
        Some(Value::String(command)) => Ok(Some(Hook::Command(command))),
        Some(value) if is_function_marker(&value) => match source {
            Some(source) => Ok(Some(Hook::Script(ScriptHook::new(source, path)))),
            None => {
                log::warn!(
                    "`{}` is a JavaScript function but the config is no longer loaded; the hook is ignored",
                    path
                );
                Ok(None)
            }
        },
        Some(other) => Err(ConfigError::InvalidHook {
            field: path.to_string(),
            reason: format!("expected a function or a shell command string, got {}", other),
        }),
    }
}

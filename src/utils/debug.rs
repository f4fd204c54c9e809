//! Namespaced debug channel.
//!
//! Messages go through the `log` facade with the namespace as target, so they
//! only appear when the logger is raised to debug for `esbuild-utils:cli`.
//! `DEBUG` enables the namespace and `DEBUG_FILTER` keeps only messages that
//! contain the filter string.

use std::sync::LazyLock;

/// Root namespace shared by every debugger.
pub const ROOT_NAMESPACE: &str = "esbuild-utils:cli";

static DEBUG: LazyLock<Option<String>> = LazyLock::new(|| env_value("DEBUG"));
static DEBUG_FILTER: LazyLock<Option<String>> = LazyLock::new(|| env_value("DEBUG_FILTER"));

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

/// Returns true when a `DEBUG` value turns on the CLI namespace.
pub fn namespace_enabled(debug: Option<&str>) -> bool {
    debug.is_some_and(|value| {
        value.split([',', ' ']).any(|pattern| {
            let pattern = pattern.trim();
            if let Some(prefix) = pattern.strip_suffix('*') {
                ROOT_NAMESPACE.starts_with(prefix) || prefix.starts_with(ROOT_NAMESPACE)
            } else {
                !pattern.is_empty() && pattern.starts_with(ROOT_NAMESPACE)
            }
        })
    })
}

/// Whether `DEBUG` in the current environment enables the CLI namespace.
pub fn enabled_from_env() -> bool {
    namespace_enabled(DEBUG.as_deref())
}

/// A debug sink bound to one namespace under [`ROOT_NAMESPACE`].
#[derive(Debug, Clone)]
pub struct Debugger {
    namespace: String,
    focus: Option<String>,
}

impl Debugger {
    /// Creates a debugger for `esbuild-utils:cli:<area>`.
    pub fn new(area: &str) -> Self {
        Self {
            namespace: format!("{ROOT_NAMESPACE}:{area}"),
            focus: None,
        }
    }

    /// Only emit when `DEBUG` names this debugger's own namespace.
    pub fn only_when_focused(mut self) -> Self {
        self.focus = Some(self.namespace.clone());
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn log(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        if should_emit(
            msg,
            DEBUG_FILTER.as_deref(),
            DEBUG.as_deref(),
            self.focus.as_deref(),
        ) {
            log::debug!(target: self.namespace.as_str(), "{}", msg);
        }
    }
}

fn should_emit(msg: &str, filter: Option<&str>, debug: Option<&str>, focus: Option<&str>) -> bool {
    if filter.is_some_and(|filter| !msg.contains(filter)) {
        return false;
    }
    match focus {
        Some(focus) => debug.is_some_and(|debug| debug.contains(focus)),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_drops_unmatched_messages() {
        assert!(should_emit("bundled config file loaded", Some("bundled"), None, None));
        assert!(!should_emit("no config file found.", Some("bundled"), None, None));
    }

    #[test]
    fn focus_requires_debug_to_name_namespace() {
        let ns = "esbuild-utils:cli:config";
        assert!(!should_emit("msg", None, None, Some(ns)));
        assert!(!should_emit("msg", None, Some("esbuild-utils:cli:build"), Some(ns)));
        assert!(should_emit("msg", None, Some("esbuild-utils:cli:config"), Some(ns)));
    }

    #[test]
    fn namespace_enable_patterns() {
        assert!(namespace_enabled(Some("*")));
        assert!(namespace_enabled(Some("esbuild-utils:*")));
        assert!(namespace_enabled(Some("esbuild-utils:cli")));
        assert!(namespace_enabled(Some("other,esbuild-utils:cli:config")));
        assert!(!namespace_enabled(Some("express:*")));
        assert!(!namespace_enabled(None));
    }

    #[test]
    fn debugger_namespaces() {
        let debug = Debugger::new("config");
        assert_eq!(debug.namespace(), "esbuild-utils:cli:config");
        assert_eq!(
            debug.only_when_focused().focus.as_deref(),
            Some("esbuild-utils:cli:config")
        );
    }
}

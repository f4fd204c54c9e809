//! Translation of build options into esbuild command line flags.
//!
//! Used when the esbuild package cannot be loaded from the config's node
//! process. Options that only exist in the JavaScript API are rejected with a
//! hint to install the package.
//!
//! Option names are the JavaScript API's camelCase names; each maps to the
//! kebab-case flag of the same name. A handful of options take lists or maps
//! and are spelled with esbuild's `--flag:key=value` syntax.

use crate::config::is_function_marker;
use crate::error::BuildError;
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Joined into a single `--flag=a,b` value.
const COMMA_LISTS: &[&str] = &[
    "target",
    "resolveExtensions",
    "mainFields",
    "conditions",
    "dropLabels",
];

/// One `--flag:item` per entry.
const REPEATED: &[&str] = &["external", "inject", "pure", "drop"];

/// One `--flag:key=value` per entry.
const KEYED: &[&str] = &[
    "define",
    "loader",
    "alias",
    "banner",
    "footer",
    "outExtension",
    "supported",
    "logOverride",
];

/// Command line for one esbuild build, minus runner-owned flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// Entry points followed by option flags
    pub args: Vec<String>,

    /// Working directory from `absWorkingDir`
    pub working_dir: Option<PathBuf>,

    /// Explicit `logLevel`, if the config set one
    pub log_level: Option<String>,

    /// `NODE_PATH` assembled from `nodePaths`
    pub node_path: Option<String>,
}

/// Builds the esbuild invocation for an option set.
pub fn build_invocation(options: &Map<String, Value>) -> Result<Invocation, BuildError> {
    let mut invocation = Invocation::default();
    let mut flags = Vec::new();

    if let Some(entry_points) = options.get("entryPoints") {
        invocation.args.extend(entry_point_args(entry_points)?);
    }

    for (key, value) in options {
        if value.is_null() {
            continue;
        }
        if contains_function(value) {
            return Err(unsupported(key, "function values need the esbuild npm package"));
        }

        match key.as_str() {
            "entryPoints" | "metafile" => {}
            "absWorkingDir" => {
                invocation.working_dir = Some(PathBuf::from(expect_str(key, value)?));
            }
            "logLevel" => {
                invocation.log_level = Some(expect_str(key, value)?.to_string());
            }
            "nodePaths" => {
                let paths = expect_str_list(key, value)?;
                let joined = std::env::join_paths(&paths)
                    .map_err(|e| unsupported(key, &e.to_string()))?;
                invocation.node_path = Some(joined.to_string_lossy().into_owned());
            }
            "write" => {
                if value == &Value::Bool(false) {
                    return Err(unsupported(key, "in-memory output needs the esbuild npm package"));
                }
            }
            "plugins" => {
                if value.as_array().is_none_or(|plugins| !plugins.is_empty()) {
                    return Err(unsupported(key, "plugins need the esbuild npm package"));
                }
            }
            "stdin" | "mangleCache" => {
                return Err(unsupported(key, "only available with the esbuild npm package"));
            }
            "tsconfigRaw" => {
                let raw = match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                flags.push(format!("--tsconfig-raw={}", raw));
            }
            "sourcemap" if value == &Value::Bool(false) => {}
            name if COMMA_LISTS.contains(&name) => {
                let items = match value {
                    Value::Array(_) => expect_str_list(key, value)?,
                    _ => vec![expect_scalar(key, value)?],
                };
                flags.push(format!("--{}={}", kebab_case(key), items.join(",")));
            }
            name if REPEATED.contains(&name) => {
                let items = match value {
                    Value::Array(_) => expect_str_list(key, value)?,
                    _ => vec![expect_scalar(key, value)?],
                };
                let flag = kebab_case(key);
                flags.extend(items.into_iter().map(|item| format!("--{}:{}", flag, item)));
            }
            name if KEYED.contains(&name) => {
                let Value::Object(entries) = value else {
                    return Err(unsupported(key, "expected an object"));
                };
                let flag = kebab_case(key);
                for (entry_key, entry_value) in entries {
                    let entry_value = expect_scalar(key, entry_value)?;
                    flags.push(format!("--{}:{}={}", flag, entry_key, entry_value));
                }
            }
            _ => flags.push(scalar_flag(key, value)?),
        }
    }

    invocation.args.extend(flags);
    Ok(invocation)
}

/// `outExtension` → `out-extension`.
pub fn kebab_case(name: &str) -> String {
    let mut kebab = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            kebab.push('-');
            kebab.push(ch.to_ascii_lowercase());
        } else {
            kebab.push(ch);
        }
    }
    kebab
}

fn entry_point_args(value: &Value) -> Result<Vec<String>, BuildError> {
    const KEY: &str = "entryPoints";
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(path) => Ok(path.clone()),
                Value::Object(entry) => {
                    let input = entry.get("in").and_then(Value::as_str);
                    let output = entry.get("out").and_then(Value::as_str);
                    match (input, output) {
                        (Some(input), Some(output)) => Ok(format!("{}={}", output, input)),
                        (Some(input), None) => Ok(input.to_string()),
                        _ => Err(unsupported(KEY, "entries need an `in` path")),
                    }
                }
                _ => Err(unsupported(KEY, "expected paths or { in, out } objects")),
            })
            .collect(),
        Value::Object(entries) => entries
            .iter()
            .map(|(output, input)| match input {
                Value::String(input) => Ok(format!("{}={}", output, input)),
                _ => Err(unsupported(KEY, "mapped entry points must be paths")),
            })
            .collect(),
        _ => Err(unsupported(KEY, "expected an array or an object")),
    }
}

fn scalar_flag(key: &str, value: &Value) -> Result<String, BuildError> {
    let flag = kebab_case(key);
    match value {
        Value::Bool(true) => Ok(format!("--{}", flag)),
        Value::Bool(false) => Ok(format!("--{}=false", flag)),
        Value::String(text) => Ok(format!("--{}={}", flag, text)),
        Value::Number(number) => Ok(format!("--{}={}", flag, number)),
        _ => Err(unsupported(key, "expected a boolean, string or number")),
    }
}

fn expect_scalar(key: &str, value: &Value) -> Result<String, BuildError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Number(number) => Ok(number.to_string()),
        _ => Err(unsupported(key, "expected a string, boolean or number")),
    }
}

fn expect_str<'a>(key: &str, value: &'a Value) -> Result<&'a str, BuildError> {
    value
        .as_str()
        .ok_or_else(|| unsupported(key, "expected a string"))
}

fn expect_str_list(key: &str, value: &Value) -> Result<Vec<String>, BuildError> {
    let Value::Array(items) = value else {
        return Err(unsupported(key, "expected an array"));
    };
    items.iter().map(|item| expect_scalar(key, item)).collect()
}

fn contains_function(value: &Value) -> bool {
    if is_function_marker(value) {
        return true;
    }
    match value {
        Value::Array(items) => items.iter().any(contains_function),
        Value::Object(entries) => entries.values().any(contains_function),
        _ => false,
    }
}

fn unsupported(key: &str, reason: &str) -> BuildError {
    BuildError::UnsupportedOption {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

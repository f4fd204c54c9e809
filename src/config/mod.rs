//! Config file loading.
//!
//! The pipeline runs in four steps, each in its own submodule:
//!
//! 1. [`resolver`] picks the config file and its module kind
//! 2. [`bundler`] compiles it and its imports into one payload with esbuild
//! 3. [`evaluator`] executes the payload in node and reads the export
//! 4. the export is normalized here into an ordered list of [`BuildConfig`]
//!
//! The node process from step 3 stays up as a [`ConfigSession`] for as long
//! as any loaded [`BuildConfig`] refers to it.

pub mod bundler;
pub mod evaluator;
pub mod resolver;
pub mod session;
mod types;

pub use bundler::{BundledPayload, bundle_config_file};
pub use evaluator::{Evaluation, load_module};
pub use resolver::{ConfigDescriptor, DEFAULT_CONFIG_FILES, ModuleKind, resolve};
pub use session::ConfigSession;
pub use types::{BuildConfig, ConfigSource, FUNCTION_MARKER, WatchMode, is_function_marker};

use crate::error::ConfigError;
use crate::tool::Toolchain;
use crate::utils::{Debugger, normalize_path};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Everything a build run needs from a loaded config file.
#[derive(Debug, Clone)]
pub struct LoadConfigResult {
    /// Normalized path of the config file
    pub path: String,

    /// Build configurations in export order
    pub config: Vec<BuildConfig>,

    /// Absolute paths of every file the config was compiled from
    pub dependencies: BTreeSet<PathBuf>,
}

/// Loads the config file named by `config_file`, or the first conventional
/// config file in `config_root`.
///
/// Returns `Ok(None)` when no config file exists. Any failure after a file
/// was selected aborts the load.
pub async fn load_config_from_file(
    config_file: Option<&Path>,
    config_root: &Path,
    toolchain: &Toolchain,
) -> Result<Option<LoadConfigResult>, ConfigError> {
    let debug = Debugger::new("config");
    let start = Instant::now();

    let Some(descriptor) = resolve(config_file, config_root)? else {
        return Ok(None);
    };

    let working_dir = std::env::current_dir().map_err(|source| ConfigError::Io {
        path: PathBuf::from("."),
        source,
    })?;

    let bundled = bundle_config_file(
        toolchain,
        &descriptor.resolved_path,
        descriptor.module_kind,
        &working_dir,
    )
    .await?;
    let evaluation = load_module(
        toolchain,
        &descriptor.resolved_path,
        &bundled.source_code,
        descriptor.module_kind,
    )
    .await?;
    debug.log(format!(
        "bundled config file loaded in {:.2}ms",
        start.elapsed().as_secs_f64() * 1000.0
    ));

    Ok(Some(LoadConfigResult {
        path: normalize_path(&descriptor.resolved_path),
        config: normalize(
            evaluation.value,
            &descriptor.resolved_path,
            Some(&evaluation.session),
        )?,
        dependencies: bundled.contributing_files,
    }))
}

/// Wraps a single exported object into a one-element list; arrays of
/// objects pass through in order. Anything else is an invalid export.
pub fn normalize_config(raw: Value, config_path: &Path) -> Result<Vec<BuildConfig>, ConfigError> {
    normalize(raw, config_path, None)
}

fn normalize(
    raw: Value,
    config_path: &Path,
    session: Option<&ConfigSession>,
) -> Result<Vec<BuildConfig>, ConfigError> {
    let invalid = || ConfigError::InvalidExport {
        path: config_path.to_path_buf(),
    };
    let config = |options, index| match session {
        Some(session) => BuildConfig::from_module(options, session, index),
        None => BuildConfig::from_object(options),
    };

    if is_function_marker(&raw) {
        return Err(invalid());
    }

    match raw {
        Value::Object(options) => Ok(vec![config(options, 0)?]),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(options) => config(options, index),
                _ => Err(invalid()),
            })
            .collect(),
        _ => Err(invalid()),
    }
}

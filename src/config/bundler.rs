//! Compiles a config file and its imports into one executable payload.

use super::resolver::ModuleKind;
use crate::error::ConfigError;
use crate::runner::diagnostics;
use crate::tool::Toolchain;
use crate::utils::Debugger;
use path_absolutize::Absolutize;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Node versions the payload is compiled for.
const CONFIG_TARGET: &str = "node14,node16";

/// Output of [`bundle_config_file`].
#[derive(Debug, Clone)]
pub struct BundledPayload {
    /// Self-contained module text with an inline source map
    pub source_code: String,

    /// Every input file that fed into `source_code`
    pub contributing_files: BTreeSet<PathBuf>,
}

#[derive(Deserialize)]
struct Metafile {
    #[serde(default)]
    inputs: BTreeMap<String, serde::de::IgnoredAny>,
}

/// Bundles `config_path` for the given module kind.
///
/// The payload is read from esbuild's standard output; only the metafile
/// touches disk and it lives in a temporary directory dropped on return.
pub async fn bundle_config_file(
    toolchain: &Toolchain,
    config_path: &Path,
    module_kind: ModuleKind,
    working_dir: &Path,
) -> Result<BundledPayload, ConfigError> {
    let debug = Debugger::new("config");
    let scratch = tempfile::Builder::new()
        .prefix("esbuild-cli-config-")
        .tempdir()
        .map_err(|source| ConfigError::Io {
            path: std::env::temp_dir(),
            source,
        })?;
    let metafile_path = scratch.path().join("meta.json");

    let args = bundle_args(config_path, module_kind, &metafile_path);
    debug.log(format!("esbuild {}", args.join(" ")));

    let output = Command::new(toolchain.esbuild())
        .args(&args)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| ConfigError::Bundle {
            path: config_path.to_path_buf(),
            reason: format!("failed to run {}: {}", toolchain.esbuild().display(), e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ConfigError::Bundle {
            path: config_path.to_path_buf(),
            reason: diagnostics::summarize(&stderr, output.status.code()),
        });
    }

    let source_code = String::from_utf8(output.stdout).map_err(|e| ConfigError::Bundle {
        path: config_path.to_path_buf(),
        reason: format!("bundled output is not valid UTF-8: {}", e),
    })?;

    let contributing_files = match read_inputs(&metafile_path, working_dir) {
        Ok(files) => files,
        Err(reason) => {
            log::debug!("metafile unavailable ({}), reporting entry only", reason);
            BTreeSet::from([config_path.to_path_buf()])
        }
    };

    Ok(BundledPayload {
        source_code,
        contributing_files,
    })
}

fn bundle_args(config_path: &Path, module_kind: ModuleKind, metafile: &Path) -> Vec<String> {
    vec![
        config_path.to_string_lossy().into_owned(),
        "--bundle".to_string(),
        "--platform=node".to_string(),
        format!("--target={}", CONFIG_TARGET),
        format!("--format={}", module_kind.format()),
        "--sourcemap=inline".to_string(),
        format!("--metafile={}", metafile.display()),
        "--log-level=error".to_string(),
        "--color=false".to_string(),
    ]
}

fn read_inputs(metafile: &Path, working_dir: &Path) -> Result<BTreeSet<PathBuf>, String> {
    let text = std::fs::read_to_string(metafile).map_err(|e| e.to_string())?;
    let metafile: Metafile = serde_json::from_str(&text).map_err(|e| e.to_string())?;
    Ok(inputs_to_paths(metafile.inputs.keys(), working_dir))
}

/// Metafile input keys are relative to the working directory; virtual
/// modules (`<stdin>`, `ns:name`) are skipped.
fn inputs_to_paths<'a>(
    keys: impl Iterator<Item = &'a String>,
    working_dir: &Path,
) -> BTreeSet<PathBuf> {
    keys.filter(|key| !key.starts_with('<') && !is_namespaced(key))
        .filter_map(|key| {
            let joined = working_dir.join(key);
            joined.absolutize().ok().map(|p| p.into_owned())
        })
        .collect()
}

fn is_namespaced(key: &str) -> bool {
    match key.split_once(':') {
        // Windows drive letters look like a one-letter namespace.
        Some((prefix, _)) => prefix.len() > 1 && !prefix.contains(['/', '\\']),
        None => false,
    }
}

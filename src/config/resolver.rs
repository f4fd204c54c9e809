//! Config file resolution and module kind detection.

use crate::error::ConfigError;
use crate::utils::{Debugger, LookupOptions, lookup_file};
use path_absolutize::Absolutize;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Conventional config file names, in priority order.
pub const DEFAULT_CONFIG_FILES: [&str; 6] = [
    "esbuild.config.mts",
    "esbuild.config.cts",
    "esbuild.config.ts",
    "esbuild.config.mjs",
    "esbuild.config.cjs",
    "esbuild.config.js",
];

/// Module convention a config file is executed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Esm,
    Cjs,
}

impl ModuleKind {
    /// esbuild `--format` value producing this module kind.
    pub fn format(self) -> &'static str {
        match self {
            Self::Esm => "esm",
            Self::Cjs => "cjs",
        }
    }
}

/// The single config file selected for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDescriptor {
    /// Absolute path of the config file
    pub resolved_path: PathBuf,

    /// How the bundled config is executed
    pub module_kind: ModuleKind,

    /// Directory the fallback search and the manifest lookup start from
    pub search_root: PathBuf,
}

#[derive(Deserialize)]
struct PackageManifest {
    #[serde(rename = "type")]
    module_type: Option<String>,
}

/// Selects the config file to load.
///
/// An explicit path is resolved against the current directory and taken
/// as-is; whether it exists is left to the bundling step. Otherwise the first
/// of [`DEFAULT_CONFIG_FILES`] that is a regular file under `search_root`
/// wins. `Ok(None)` means no config was found.
pub fn resolve(
    explicit_path: Option<&Path>,
    search_root: &Path,
) -> Result<Option<ConfigDescriptor>, ConfigError> {
    let debug = Debugger::new("config");
    let search_root = absolutize(search_root)?;

    let resolved_path = match explicit_path {
        Some(path) => absolutize(path)?,
        None => {
            let found = DEFAULT_CONFIG_FILES
                .iter()
                .map(|name| search_root.join(name))
                .find(|candidate| candidate.is_file());

            match found {
                Some(path) => path,
                None => {
                    debug.log("no config file found.");
                    return Ok(None);
                }
            }
        }
    };

    let module_kind = detect_module_kind(&resolved_path, &search_root);
    debug.log(format!(
        "resolved config {} as {:?}",
        resolved_path.display(),
        module_kind
    ));

    Ok(Some(ConfigDescriptor {
        resolved_path,
        module_kind,
        search_root,
    }))
}

/// `.mjs`/`.mts` force ESM and `.cjs`/`.cts` force CJS; anything else follows
/// the `type` field of the nearest `package.json` above `search_root`.
pub fn detect_module_kind(config_path: &Path, search_root: &Path) -> ModuleKind {
    let name = config_path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();

    if name.ends_with(".mjs") || name.ends_with(".mts") {
        ModuleKind::Esm
    } else if name.ends_with(".cjs") || name.ends_with(".cts") {
        ModuleKind::Cjs
    } else if manifest_declares_module(search_root) {
        ModuleKind::Esm
    } else {
        ModuleKind::Cjs
    }
}

fn manifest_declares_module(search_root: &Path) -> bool {
    let Some(manifest_path) = lookup_file(search_root, &["package.json"], &LookupOptions::default())
    else {
        return false;
    };

    let manifest = std::fs::read_to_string(&manifest_path)
        .map_err(|e| e.to_string())
        .and_then(|text| {
            serde_json::from_str::<PackageManifest>(&text).map_err(|e| e.to_string())
        });

    match manifest {
        Ok(manifest) => manifest.module_type.as_deref() == Some("module"),
        Err(e) => {
            log::debug!(
                "ignoring unreadable manifest {}: {}",
                manifest_path.display(),
                e
            );
            false
        }
    }
}

fn absolutize(path: &Path) -> Result<PathBuf, ConfigError> {
    path.absolutize()
        .map(|p| p.into_owned())
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
}

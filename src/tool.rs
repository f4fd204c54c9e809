//! External tool detection.
//!
//! Locates the esbuild executable that performs every build and the `node`
//! runtime that executes bundled config files.

use crate::error::ToolNotFound;
use crate::utils::{LookupOptions, lookup_file};
use std::path::{Path, PathBuf};

/// Homepage printed in the remediation message.
pub const ESBUILD_URL: &str = "https://github.com/evanw/esbuild";

/// Overrides bundler discovery, same variable the esbuild npm package honors.
pub const ESBUILD_BINARY_PATH_ENV: &str = "ESBUILD_BINARY_PATH";

#[cfg(windows)]
const LOCAL_ESBUILD: &[&str] = &[
    "node_modules/.bin/esbuild.cmd",
    "node_modules/esbuild/esbuild.exe",
];

#[cfg(not(windows))]
const LOCAL_ESBUILD: &[&str] = &["node_modules/.bin/esbuild", "node_modules/esbuild/bin/esbuild"];

/// Executables used by the loader and the runner.
#[derive(Debug, Clone)]
pub struct Toolchain {
    esbuild: PathBuf,
    node: Option<PathBuf>,
    /// npm package the esbuild executable belongs to, if any
    esbuild_package: Option<PathBuf>,
}

impl Toolchain {
    /// Detects the toolchain for a project rooted at (or below) `cwd`.
    ///
    /// A missing esbuild is an error; a missing `node` only becomes one when
    /// a config file has to be evaluated.
    pub fn detect(cwd: &Path) -> Result<Self, ToolNotFound> {
        let esbuild = find_esbuild(cwd)?;
        let node = match which::which("node") {
            Ok(path) => {
                log::debug!("Found node at: {}", path.display());
                Some(path)
            }
            Err(e) => {
                log::debug!("node not found in PATH: {}", e);
                None
            }
        };
        Ok(Self::new(esbuild, node))
    }

    /// Builds a toolchain from known locations.
    pub fn new(esbuild: PathBuf, node: Option<PathBuf>) -> Self {
        let esbuild_package = package_dir(&esbuild);
        Self {
            esbuild,
            node,
            esbuild_package,
        }
    }

    pub fn esbuild(&self) -> &Path {
        &self.esbuild
    }

    /// Directory of the `esbuild` npm package that shipped the executable.
    ///
    /// Config files that cannot resolve esbuild themselves use this package
    /// for the JavaScript API.
    pub fn esbuild_package(&self) -> Option<&Path> {
        self.esbuild_package.as_deref()
    }

    /// The `node` runtime, or an error naming what is missing.
    pub fn node(&self) -> Result<&Path, ToolNotFound> {
        self.node.as_deref().ok_or_else(|| ToolNotFound {
            tool: "node",
            reason: "config files are executed with node; install it and make sure it is on PATH"
                .to_string(),
        })
    }
}

/// Finds esbuild: `$ESBUILD_BINARY_PATH`, then the nearest `node_modules`
/// walking up from `cwd`, then `PATH`.
pub fn find_esbuild(cwd: &Path) -> Result<PathBuf, ToolNotFound> {
    if let Some(path) = std::env::var_os(ESBUILD_BINARY_PATH_ENV).map(PathBuf::from) {
        if path.is_file() {
            log::debug!("Using esbuild from {}: {}", ESBUILD_BINARY_PATH_ENV, path.display());
            return Ok(path);
        }
        log::warn!(
            "{} points at {} which is not a file, falling back to discovery",
            ESBUILD_BINARY_PATH_ENV,
            path.display()
        );
    }

    if let Some(path) = lookup_file(cwd, LOCAL_ESBUILD, &LookupOptions::default()) {
        log::debug!("Found project esbuild at: {}", path.display());
        return Ok(path);
    }

    match which::which("esbuild") {
        Ok(path) => {
            log::debug!("Found esbuild on PATH at: {}", path.display());
            Ok(path)
        }
        Err(e) => Err(ToolNotFound {
            tool: "esbuild",
            reason: format!(
                "not installed in {} or any parent node_modules, and not on PATH ({})",
                cwd.display(),
                e
            ),
        }),
    }
}

/// Nearest ancestor of the resolved executable named `esbuild` that holds a
/// `package.json`. `node_modules/.bin/esbuild` is a symlink into it.
fn package_dir(esbuild: &Path) -> Option<PathBuf> {
    let resolved = std::fs::canonicalize(esbuild).ok()?;
    let package = resolved
        .ancestors()
        .skip(1)
        .find(|dir| {
            dir.file_name().is_some_and(|name| name == "esbuild")
                && dir.join("package.json").is_file()
        })?
        .to_path_buf();
    log::debug!("esbuild package at: {}", package.display());
    Some(package)
}

/// Message printed when esbuild cannot be found.
pub fn install_notice() -> String {
    format!(
        "CLI for esbuild must be installed.\n esbuild ({})\n\nInstall it into the project with a package manager, e.g. npm install -D esbuild",
        ESBUILD_URL
    )
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn finds_esbuild_in_ancestor_node_modules() {
        let root = TempDir::new().unwrap();
        let bin = root.path().join("node_modules").join(".bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join("esbuild"), "#!/bin/sh\n").unwrap();
        let nested = root.path().join("packages").join("app");
        fs::create_dir_all(&nested).unwrap();

        let found = find_esbuild(&nested).unwrap();
        assert_eq!(found, bin.join("esbuild"));
    }

    #[test]
    fn package_is_found_through_bin_symlink() {
        let root = TempDir::new().unwrap();
        let package = root.path().join("node_modules").join("esbuild");
        fs::create_dir_all(package.join("bin")).unwrap();
        fs::write(package.join("package.json"), r#"{ "name": "esbuild" }"#).unwrap();
        fs::write(package.join("bin").join("esbuild"), "#!/bin/sh\n").unwrap();
        let bin = root.path().join("node_modules").join(".bin");
        fs::create_dir_all(&bin).unwrap();
        std::os::unix::fs::symlink(package.join("bin").join("esbuild"), bin.join("esbuild")).unwrap();

        let toolchain = Toolchain::new(bin.join("esbuild"), None);
        assert_eq!(
            toolchain.esbuild_package(),
            Some(fs::canonicalize(&package).unwrap().as_path())
        );
    }

    #[test]
    fn standalone_binary_has_no_package() {
        let root = TempDir::new().unwrap();
        let binary = root.path().join("esbuild");
        fs::write(&binary, "#!/bin/sh\n").unwrap();
        assert!(Toolchain::new(binary, None).esbuild_package().is_none());
    }

    #[test]
    fn missing_node_is_reported_on_use() {
        let toolchain = Toolchain::new(PathBuf::from("/usr/bin/esbuild"), None);
        let err = toolchain.node().unwrap_err();
        assert_eq!(err.tool, "node");
    }
}

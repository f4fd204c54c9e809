//! Shared testing utilities for esbuild-cli tests.

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Testing harness providing an isolated project directory.
#[allow(dead_code)]
pub struct TestContext {
    root: TempDir,
    work_dir: PathBuf,
}

#[allow(dead_code)]
impl TestContext {
    /// Create a new isolated environment.
    pub fn new() -> Self {
        let root = TempDir::new().expect("Failed to create temp directory for tests");
        let work_dir = root.path().join("project");
        fs::create_dir_all(&work_dir).expect("Failed to create test work directory");
        Self { root, work_dir }
    }

    /// Directory the CLI runs in.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Scratch directory outside the project.
    pub fn scratch(&self) -> &Path {
        self.root.path()
    }

    /// Write a file relative to the project directory.
    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.work_dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, contents).expect("Failed to write test file");
        path
    }

    /// Read a file relative to the project directory.
    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.work_dir.join(relative)).expect("Failed to read test file")
    }

    /// Build a command for the compiled binary inside the project directory.
    pub fn cli(&self) -> Command {
        let mut cmd = Command::cargo_bin("esbuild-cli").expect("Failed to locate esbuild-cli binary");
        cmd.current_dir(&self.work_dir)
            .env("NO_COLOR", "1")
            .env_remove("DEBUG")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Like [`cli`](Self::cli), with a stand-in esbuild that is never run.
    ///
    /// Enough for commands that only need esbuild to be discoverable.
    #[cfg(unix)]
    pub fn cli_with_stub_esbuild(&self) -> Command {
        self.cli_with_esbuild_script("exit 0")
    }

    /// Like [`cli`](Self::cli), with esbuild replaced by a shell script.
    #[cfg(unix)]
    pub fn cli_with_esbuild_script(&self, body: &str) -> Command {
        let stub = self.stub_esbuild(body);
        let mut cmd = self.cli();
        cmd.env("ESBUILD_BINARY_PATH", &stub);
        cmd
    }

    /// Writes a shell script standing in for esbuild and returns its path.
    #[cfg(unix)]
    pub fn stub_esbuild(&self, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let stub = self.root.path().join("bin").join("esbuild");
        fs::create_dir_all(stub.parent().unwrap()).unwrap();
        fs::write(&stub, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).unwrap();
        stub
    }
}

/// esbuild stand-in: prints the config file as its own bundle and succeeds
/// every other build without writing anything.
#[allow(dead_code)]
pub const PASSTHROUGH_BUNDLER: &str = r#"case " $* " in
  *" --bundle "*) cat "$1" ;;
esac
exit 0"#;

/// esbuild stand-in that fails every run like an unresolvable import.
#[allow(dead_code)]
pub const UNRESOLVED_IMPORT: &str = r#"echo '✘ [ERROR] Could not resolve "./missing"' >&2
exit 1"#;

/// `node`, when installed.
#[allow(dead_code)]
pub fn node() -> Option<PathBuf> {
    let node = which::which("node").ok();
    if node.is_none() {
        eprintln!("node not installed, skipping");
    }
    node
}

/// Real esbuild and node, when both are installed.
///
/// End-to-end tests return early without them.
#[allow(dead_code)]
pub fn real_tools() -> Option<(PathBuf, PathBuf)> {
    let esbuild = std::env::var_os("ESBUILD_BINARY_PATH")
        .map(PathBuf::from)
        .filter(|path| path.is_file())
        .or_else(|| which::which("esbuild").ok());
    let node = which::which("node").ok();
    match (esbuild, node) {
        (Some(esbuild), Some(node)) => Some((esbuild, node)),
        _ => {
            eprintln!("esbuild or node not installed, skipping");
            None
        }
    }
}

//! Executes a bundled config payload and extracts its export.
//!
//! Each load starts a fresh [`ConfigSession`], so a reload always sees the
//! current file contents. ESM payloads are staged as a temporary sibling
//! `.mjs` file; CJS payloads are sent with the load request and compiled in
//! place of the config file by an intercepted module loader. The session
//! outlives the load so that functions the config exports can be called
//! later.

use super::resolver::ModuleKind;
use super::session::ConfigSession;
use crate::error::ConfigError;
use crate::tool::Toolchain;
use crate::utils::fs::remove_file_if_exists;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// At most one evaluation is in flight per process.
static EVALUATION_LOCK: Mutex<()> = Mutex::const_new(());

/// A loaded config module.
#[derive(Debug)]
pub struct Evaluation {
    /// The module's export; `Value::Null` when it exports nothing
    pub value: Value,

    /// The node process still holding the module
    pub session: ConfigSession,
}

/// Runs `payload` as the module at `config_path` and keeps it loaded.
///
/// Shape checks on the export are left to the caller.
pub async fn load_module(
    toolchain: &Toolchain,
    config_path: &Path,
    payload: &str,
    module_kind: ModuleKind,
) -> Result<Evaluation, ConfigError> {
    let _in_flight = EVALUATION_LOCK.lock().await;
    let node = toolchain.node()?;
    let esbuild_package = toolchain.esbuild_package();

    let (value, session) = match module_kind {
        ModuleKind::Esm => {
            let module = TempModule::write(config_path, payload).await?;
            let session = ConfigSession::spawn(
                node,
                config_path,
                module.path(),
                module_kind,
                esbuild_package,
            )?;
            (session.load(None).await?, session)
        }
        ModuleKind::Cjs => {
            let session =
                ConfigSession::spawn(node, config_path, config_path, module_kind, esbuild_package)?;
            (session.load(Some(payload)).await?, session)
        }
    };

    log::debug!(
        "config {} loaded, esbuild API {}",
        config_path.display(),
        if session.api_available() { "available" } else { "not found" }
    );
    Ok(Evaluation { value, session })
}

/// Temporary `.mjs` sibling of a config file, removed on drop.
struct TempModule {
    path: PathBuf,
}

impl TempModule {
    async fn write(config_path: &Path, payload: &str) -> Result<Self, ConfigError> {
        let path = temp_module_path(config_path);
        tokio::fs::write(&path, payload)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempModule {
    fn drop(&mut self) {
        // Missing is fine: a concurrent duplicate run may have removed it.
        if let Err(e) = remove_file_if_exists(&self.path) {
            log::warn!(
                "failed to remove temporary config module {}: {}",
                self.path.display(),
                e
            );
        }
    }
}

/// `<config>.timestamp-<millis>-<random>.mjs` next to the config file.
fn temp_module_path(config_path: &Path) -> PathBuf {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let mut name = config_path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(format!(
        ".timestamp-{}-{}.mjs",
        chrono::Utc::now().timestamp_millis(),
        &suffix[..8]
    ));
    config_path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn temp_module_names_are_unique_siblings() {
        let config = Path::new("/app/esbuild.config.mts");
        let first = temp_module_path(config);
        let second = temp_module_path(config);

        assert_ne!(first, second);
        assert_eq!(first.parent(), config.parent());
        let name = first.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("esbuild.config.mts.timestamp-"));
        assert!(name.ends_with(".mjs"));
    }

    #[tokio::test]
    async fn temp_module_is_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("esbuild.config.mjs");

        let module = TempModule::write(&config, "export default {};").await.unwrap();
        let path = module.path().to_path_buf();
        assert!(path.exists());
        drop(module);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn temp_module_tolerates_early_removal() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("esbuild.config.mjs");

        let module = TempModule::write(&config, "export default {};").await.unwrap();
        std::fs::remove_file(module.path()).unwrap();
        drop(module);
    }

    #[tokio::test]
    async fn missing_node_fails_evaluation() {
        let toolchain = Toolchain::new(PathBuf::from("esbuild"), None);
        let err = load_module(
            &toolchain,
            Path::new("/app/esbuild.config.js"),
            "module.exports = {};",
            ModuleKind::Cjs,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ConfigError::Tool(_)));
    }
}

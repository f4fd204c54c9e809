//! `build` (and the bare invocation): load the config file and run it.

use crate::cli::RuntimeConfig;
use crate::config::load_config_from_file;
use crate::error::Result;
use crate::runner;
use crate::utils::{Debugger, normalize_path};
use std::path::Path;

/// Execute the build command
///
/// # Arguments
/// * `config` - Explicit config file, relative to the working directory
/// * `runtime_config` - Output and toolchain
///
/// # Returns
/// Exit code: 1 when no config could be loaded, 0 otherwise. Failed builds
/// are reported but do not change the exit code.
pub async fn execute(config: Option<&Path>, runtime_config: &RuntimeConfig) -> Result<i32> {
    let debug = Debugger::new("build");
    let out = runtime_config.output();

    let loaded = match load_config_from_file(
        config,
        runtime_config.working_dir(),
        runtime_config.toolchain(),
    )
    .await
    {
        Ok(Some(loaded)) => loaded,
        Ok(None) => {
            out.error("Could not load config file.");
            return Ok(1);
        }
        Err(e) => {
            let path = e
                .path()
                .map(normalize_path)
                .or_else(|| config.map(normalize_path))
                .unwrap_or_else(|| normalize_path(runtime_config.working_dir()));
            out.error(&format!("failed to load config from {}", path));
            out.eprintln(&format!("Error: {}", e));
            return Ok(1);
        }
    };

    debug.log(format!("using config file {}", loaded.path));
    // Long for large configs; only listed when DEBUG names this namespace.
    let deps = Debugger::new("build:deps").only_when_focused();
    for dependency in &loaded.dependencies {
        deps.log(format!("depends on {}", normalize_path(dependency)));
    }

    runner::run_all(&loaded.config, runtime_config).await;
    Ok(0)
}

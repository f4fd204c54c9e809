//! `init`: scaffold a config file in the working directory.

use crate::cli::{InitArgs, RuntimeConfig};
use crate::error::{ConfigError, Result};
use std::path::Path;

/// What goes into a scaffolded config file.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Write TypeScript instead of CommonJS
    pub typescript: bool,

    /// Value of `entryPoints`
    pub input: Option<String>,

    /// Value of `outfile`
    pub output: Option<String>,
}

impl From<&InitArgs> for InitOptions {
    fn from(args: &InitArgs) -> Self {
        Self {
            typescript: args.typescript,
            input: args.input.clone(),
            output: args.output.clone(),
        }
    }
}

impl InitOptions {
    /// File name written by `init` for these options.
    pub fn file_name(&self) -> &'static str {
        if self.typescript {
            "esbuild.config.ts"
        } else {
            "esbuild.config.js"
        }
    }
}

/// Renders the config file text.
///
/// Values are emitted as JSON string literals, which are valid in both
/// JavaScript and TypeScript.
pub fn create_contents(options: &InitOptions) -> String {
    let mut contents = if options.typescript {
        String::from("import type { BuildOptions } from \"esbuild\";\n\nconst config: BuildOptions = {")
    } else {
        String::from("/** @type { import(\"esbuild\").BuildOptions } */\nmodule.exports = {")
    };

    if let Some(input) = &options.input {
        contents.push_str(&format!("\n  entryPoints: [{}],", js_string(input)));
    }
    if let Some(output) = &options.output {
        contents.push_str(&format!("\n  outfile: {},", js_string(output)));
    }
    if options.input.is_some() || options.output.is_some() {
        contents.push('\n');
    }
    contents.push_str("};\n");

    if options.typescript {
        contents.push_str("\nexport default config;\n");
    }
    contents
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Writes the config file to `file`, creating parent directories.
pub async fn write_config(file: &Path, options: &InitOptions) -> std::result::Result<(), ConfigError> {
    let io_error = |source| ConfigError::Io {
        path: file.to_path_buf(),
        source,
    };

    if let Some(parent) = file.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }
    tokio::fs::write(file, create_contents(options))
        .await
        .map_err(io_error)
}

/// Execute the init command
pub async fn execute(args: &InitArgs, runtime_config: &RuntimeConfig) -> Result<i32> {
    let options = InitOptions::from(args);
    let dir = runtime_config.working_dir();
    let file = dir.join(options.file_name());
    let out = runtime_config.output();

    match write_config(&file, &options).await {
        Ok(()) => {
            out.success(&format!("[esbuild] Initialized in {}", dir.display()));
        }
        Err(e) => {
            log::debug!("init failed for {}: {:?}", file.display(), e);
            out.error("[esbuild] Initialization failure");
            out.error(&format!("  {}", e));
        }
    }
    Ok(0)
}

//! esbuild-cli - config file driven command line for esbuild.

use esbuild_cli::cli;
use esbuild_cli::utils::debug;
use std::process;

#[tokio::main]
async fn main() {
    init_logging();

    // Run CLI and get exit code
    let exit_code = match cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    process::exit(exit_code);
}

/// `RUST_LOG` as usual, with the `esbuild-utils:cli` namespace raised to
/// debug when `DEBUG` selects it.
fn init_logging() {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if debug::enabled_from_env() {
        builder.filter(Some(debug::ROOT_NAMESPACE), log::LevelFilter::Debug);
    }
    builder.init();
}

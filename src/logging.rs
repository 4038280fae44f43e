//! Tracing setup for the binary.

use std::fs::File;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Environment variable naming a log file; when set, logs go there at debug level.
pub const LOG_FILE_ENV: &str = "GATEWAY_LOG";

const DEFAULT_FILTER: &str = "llm_gateway=info";

/// Install the global subscriber. Safe to call more than once.
///
/// With `GATEWAY_LOG=<path>` logs are written to that file at
/// `llm_gateway=debug`. Otherwise they go to stderr filtered by `RUST_LOG`,
/// or `llm_gateway=info` when it is unset (`verbose` raises that to debug).
pub fn init(verbose: bool) {
    if let Some(path) = std::env::var_os(LOG_FILE_ENV) {
        match File::create(&path) {
            Ok(file) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(file)
                    .with_ansi(false);
                let filter = EnvFilter::new("llm_gateway=debug");
                let _ = tracing_subscriber::registry()
                    .with(file_layer.with_filter(filter))
                    .try_init();
                return;
            }
            Err(err) => {
                eprintln!("Failed to create log file {}: {err}", path.to_string_lossy());
            }
        }
    }

    let filter = if verbose {
        EnvFilter::new("llm_gateway=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber. Everything goes
//! to stderr: stdout stays clean and the progress UI owns the terminal, so
//! the default level is `warn` unless `--verbose` or `RUST_LOG` raises it.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber for a binary.
///
/// `verbose` raises the default level from `warn` to `info`; `RUST_LOG`
/// always wins. Safe to call once; later calls are ignored.
pub fn init(verbose: bool) {
    let default_level = if verbose { Level::INFO } else { Level::WARN };
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

use std::path::Path;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

const DEFAULT_FILTER: &str = "info";
const LOG_FILE_PREFIX: &str = "brownie.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Log to stderr. Safe to call more than once.
pub fn init_tracing() {
    let _ = fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Log to a daily rolling file in `dir`. Keep the guard alive for as long as
/// logs should be flushed.
pub fn init_file_tracing(dir: impl AsRef<Path>) -> WorkerGuard {
    let appender = rolling::daily(dir.as_ref(), LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(writer)
        .try_init();
    guard
}

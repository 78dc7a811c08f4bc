use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE: &str = "lumina.log";

/// Directory holding `lumina.log`, if the platform has a data directory.
pub fn log_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("lumina"))
}

/// Initialize tracing to a log file. The terminal belongs to the UI, so
/// nothing is written to stdout or stderr.
///
/// Default level: INFO with debug for Lumina's own crates, override via
/// RUST_LOG. The returned guard flushes the writer when dropped and must be
/// held for the life of the program.
pub fn init() -> WorkerGuard {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,lumina_core=debug,lumina=debug"));

    let dir = log_dir().filter(|dir| std::fs::create_dir_all(dir).is_ok());
    let (writer, guard) = match &dir {
        Some(dir) => tracing_appender::non_blocking(tracing_appender::rolling::never(dir, LOG_FILE)),
        None => tracing_appender::non_blocking(std::io::sink()),
    };

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    match dir {
        Some(dir) => tracing::debug!(path = %dir.join(LOG_FILE).display(), "Tracing initialized"),
        None => tracing::debug!("Tracing initialized without a log directory"),
    }

    guard
}

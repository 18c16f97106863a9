use crate::constants::ENV_LOG_DIR;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes logging: human-readable console output on stderr and JSON to a daily log file.
///
/// Stdout is left to the job summary. The returned guard must stay alive until exit so
/// buffered file logs are flushed.
pub fn init_logging() -> WorkerGuard {
    let log_dir = std::env::var(ENV_LOG_DIR).unwrap_or_else(|_| "logs".to_string());
    let _ = fs::create_dir_all(&log_dir);

    let file_appender = tracing_appender::rolling::daily(&log_dir, "merlin_ingest.log");
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);
    let console_layer = fmt::layer().with_writer(std::io::stderr);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("merlin_ingest=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    guard
}

use std::fs;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes the logging system with both console and file output.
///
/// File logs are JSON lines rotated daily; the directory defaults to
/// `logs/` and can be moved with `VOC_LOG_DIR`.
pub fn init_logging() {
    let log_dir = std::env::var("VOC_LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    let _ = fs::create_dir_all(&log_dir);

    let file_appender = tracing_appender::rolling::daily(&log_dir, "normalizer.log");
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);
    let console_layer = fmt::layer().with_writer(std::io::stdout);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("voc_normalizer=info".parse().unwrap()))
        .with(file_layer)
        .with(console_layer)
        .init();

    // The guard must outlive the process so file logs are flushed on exit
    std::mem::forget(guard);
}

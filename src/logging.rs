use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Initializes the logging system with console output and, when enabled, a
/// daily-rotated JSON file.
///
/// The returned guard flushes the file writer when dropped: keep it alive
/// until the process exits.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Console logs go to stderr so that `list --json` output stays parseable
    let console_layer = fmt::layer().with_writer(std::io::stderr);

    let (file_layer, guard) = if config.json_file && fs::create_dir_all(&config.directory).is_ok() {
        let file_appender = tracing_appender::rolling::daily(&config.directory, &config.file_prefix);
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
        let layer = fmt::layer().json().with_writer(non_blocking_writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // A subscriber may already be installed (tests, embedding applications)
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();

    guard
}

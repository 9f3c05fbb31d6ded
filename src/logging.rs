use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Initializes the logging system with console output and a per-run JSON log file.
///
/// Returns the log file path and the guard that flushes the file writer; keep
/// the guard alive until the process exits.
pub fn init_logging(config: &LoggingConfig, run_stamp: &str) -> std::io::Result<(PathBuf, WorkerGuard)> {
    fs::create_dir_all(&config.dir)?;

    let file_name = log_file_name(run_stamp);
    let file_appender = tracing_appender::rolling::never(&config.dir, &file_name);
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);

    let console_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stdout);

    // RUST_LOG wins; otherwise the configured default
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    Ok((Path::new(&config.dir).join(file_name), guard))
}

pub fn log_file_name(run_stamp: &str) -> String {
    format!("pipeline_{}.log", run_stamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_name_carries_run_stamp() {
        assert_eq!(log_file_name("20240101_120000"), "pipeline_20240101_120000.log");
    }
}

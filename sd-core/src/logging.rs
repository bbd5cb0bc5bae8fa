//! Structured logging setup using the `tracing` ecosystem.
//!
//! Console output always goes to stderr so that interactive commands can
//! keep stdout for room traffic. File output rotates daily and may be JSON.

use std::path::Path;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::AppConfig;
use crate::error::{SdError, SdResult};

/// Name of the rolling log file inside the log directory.
const LOG_FILE_NAME: &str = "streamdemo.log";

/// Initialize the global tracing subscriber with the given settings.
///
/// # Arguments
/// * `level` - Filter directive, e.g. "info" or "sd_socket=debug,info"
/// * `log_dir` - Directory for log files
/// * `json_output` - If true, use JSON format for file output
pub fn init_logging(level: &str, log_dir: &Path, json_output: bool) -> SdResult<LogGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = rolling::daily(log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact();

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let registry = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(console_layer);

    let installed = if json_output {
        registry.with(file_layer.json()).try_init()
    } else {
        registry.with(file_layer).try_init()
    };
    installed.map_err(|e| SdError::Internal(format!("failed to install subscriber: {e}")))?;

    tracing::info!("logging initialized at level={level}, dir={}", log_dir.display());

    Ok(LogGuard { _guard: guard })
}

/// Initialize logging from the `[logging]` section of the app config.
///
/// `verbose` forces the `debug` level regardless of the configured one.
pub fn init_from_config(config: &AppConfig, verbose: bool) -> SdResult<LogGuard> {
    let level = if verbose { "debug" } else { config.logging.level.as_str() };
    let dir = config.effective_log_dir()?;
    init_logging(level, &dir, config.logging.json_output)
}

/// Guard that keeps the non-blocking log writer alive.
/// Drop this to flush and close the log file.
pub struct LogGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Initialize a minimal console-only logger for tests and one-shot commands.
///
/// Never fails: an invalid level falls back to `info`, and a subscriber that
/// is already installed is left in place.
pub fn init_console_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true).compact())
        .try_init();
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_logging_does_not_panic() {
        // Subsequent calls are no-ops.
        init_console_logging("debug");
        init_console_logging("not a level");
    }

    #[test]
    fn test_env_filter_fallback() {
        let filter = env_filter("sd_socket=trace,info");
        assert!(filter.to_string().contains("sd_socket=trace"));
    }
}

//! Logging initialisation shared by the pointflow binaries
//!
//! ```text
//!   registry ─┬─ EnvFilter        (RUST_LOG, else LogConfig::level)
//!             ├─ console layer    2025-12-02T00:50:44.809000Z [INFO] message
//!             └─ file layer       {directory}/{file_prefix}.log.YYYY-MM-DD
//! ```

use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::error::{ConfigError, Result};

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Event formatter that outputs: `timestamp [LEVEL] message`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m", // magenta
                Level::DEBUG => "\x1b[34m", // blue
                Level::INFO => "\x1b[32m",  // green
                Level::WARN => "\x1b[33m",  // yellow
                Level::ERROR => "\x1b[31m", // red
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Logger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is not set, e.g. `info` or `info,pointflow_modbus=debug`
    pub level: String,
    /// Directory of the daily log files; console only when absent
    pub directory: Option<PathBuf>,
    /// File name prefix of the daily log files
    pub file_prefix: String,
    /// Write the file layer as JSON lines
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "pointflow".to_string(),
            json: false,
        }
    }
}

// Keeps the non-blocking file writer alive; `Some` once logging is initialised
static LOG_STATE: OnceLock<Option<WorkerGuard>> = OnceLock::new();
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Whether [`init_logging`] already installed the global subscriber
pub fn is_initialized() -> bool {
    LOG_STATE.get().is_some()
}

/// Install the global subscriber
///
/// Later calls return `Ok(())` without touching the installed subscriber.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let _lock = match INIT_LOCK.lock() {
        Ok(lock) => lock,
        Err(poisoned) => poisoned.into_inner(),
    };
    if is_initialized() {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(env) if !env.is_empty() => EnvFilter::try_new(&env)
            .map_err(|e| ConfigError::logging(format!("Invalid RUST_LOG '{}': {}", env, e)))?,
        _ => EnvFilter::try_new(&config.level).map_err(|e| {
            ConfigError::logging(format!("Invalid log level '{}': {}", config.level, e))
        })?,
    };

    let console_layer = fmt::layer()
        .with_ansi(true)
        .event_format(BracketedLevelFormat)
        .boxed();

    let mut guard = None;
    let file_layer = match &config.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory)?;
            let appender = tracing_appender::rolling::daily(
                directory,
                format!("{}.log", config.file_prefix),
            );
            let (non_blocking, worker_guard) = tracing_appender::non_blocking(appender);
            guard = Some(worker_guard);

            let layer = if config.json {
                fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_level(true)
                    .with_target(true)
                    .boxed()
            } else {
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .event_format(BracketedLevelFormat)
                    .boxed()
            };
            Some(layer)
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ConfigError::logging(format!("Failed to install subscriber: {}", e)))?;

    let _ = LOG_STATE.set(guard);
    tracing::debug!(
        "Logging initialised: level={}, directory={:?}, json={}",
        config.level,
        config.directory,
        config.json
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_format_level() {
        assert_eq!(format_level(&Level::INFO), "[INFO]");
        assert_eq!(format_level(&Level::ERROR), "[ERROR]");
    }

    #[test]
    fn test_log_config_defaults_from_yaml() {
        let config: LogConfig =
            serde_yaml::from_str("level: debug\ndirectory: /var/log/pf\n").unwrap();
        assert_eq!(config.level, "debug");
        assert_eq!(config.directory, Some(PathBuf::from("/var/log/pf")));
        assert_eq!(config.file_prefix, "pointflow");
        assert!(!config.json);
    }

    #[test]
    fn test_init_logging_twice() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            directory: Some(dir.path().join("logs")),
            file_prefix: "flowtest".to_string(),
            ..LogConfig::default()
        };

        init_logging(&config).unwrap();
        assert!(is_initialized());
        tracing::info!("first init done");

        init_logging(&LogConfig::default()).unwrap();
        assert!(dir.path().join("logs").is_dir());
    }
}

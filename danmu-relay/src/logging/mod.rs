//! Tracing subscriber setup.
//!
//! The filter sits behind a reload layer so the API can change verbosity
//! without a restart. Console lines carry local time; file output, when
//! enabled, rotates daily.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    registry::Registry,
    reload::{self, Handle},
    util::SubscriberInitExt,
};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "danmu_relay=info,danmaku=info,tower_http=info";

/// Prefix of rotated log file names.
const LOG_FILE_PREFIX: &str = "danmu-relay.log";

#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

pub type FilterHandle = Handle<EnvFilter, Registry>;

/// Handle to the live logging configuration.
pub struct LoggingConfig {
    handle: FilterHandle,
    log_dir: Option<PathBuf>,
}

impl LoggingConfig {
    /// Active filter, rendered as a directive string.
    pub fn get_filter(&self) -> String {
        self.handle
            .with_current(ToString::to_string)
            .unwrap_or_default()
    }

    /// Replace the filter directive (e.g. `"danmu_relay=debug"`).
    pub fn set_filter(&self, directive: &str) -> crate::Result<()> {
        let new_filter = EnvFilter::try_new(directive)
            .map_err(|e| crate::Error::LogFilter(e.to_string()))?;

        self.handle
            .reload(new_filter)
            .map_err(|e| crate::Error::Logging(format!("failed to reload filter: {e}")))?;

        info!(directive = %directive, "Log filter updated");
        Ok(())
    }

    /// Directory receiving log files, if file logging is enabled.
    pub fn log_dir(&self) -> Option<&std::path::Path> {
        self.log_dir.as_deref()
    }
}

/// Initialize the global subscriber.
///
/// Console output is always enabled. When `log_dir` is given, logs are also
/// written to daily-rotated files there; keep the returned guard alive for the
/// lifetime of the process so buffered lines are flushed.
pub fn init_logging(
    log_dir: Option<&str>,
) -> crate::Result<(Arc<LoggingConfig>, Option<WorkerGuard>)> {
    let initial_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let (filter_layer, filter_handle) = reload::Layer::new(initial_filter);

    let log_path = log_dir.map(PathBuf::from);
    let (file_layer, guard) = match &log_path {
        Some(path) => {
            std::fs::create_dir_all(path)?;
            let file_appender = tracing_appender::rolling::daily(path, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .with(file_layer)
        .try_init()
        .map_err(|e| crate::Error::Logging(format!("failed to install subscriber: {e}")))?;

    let config = Arc::new(LoggingConfig {
        handle: filter_handle,
        log_dir: log_path,
    });

    Ok((config, guard))
}

/// Logging targets worth tuning, for API responses.
pub fn available_modules() -> Vec<(&'static str, &'static str)> {
    vec![
        ("danmu_relay", "Relay application"),
        ("danmu_relay::ingest", "WebSocket listener and sessions"),
        ("danmu_relay::api", "Consumer HTTP API"),
        ("danmaku", "Codec and retention buffer"),
        ("tower_http", "HTTP middleware"),
        ("tungstenite", "WebSocket protocol"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert!(DEFAULT_LOG_FILTER.contains("danmu_relay=info"));
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }

    #[test]
    fn test_reload_handle_round_trip() {
        let (_layer, handle) =
            reload::Layer::<EnvFilter, Registry>::new(EnvFilter::new("info"));
        let config = LoggingConfig {
            handle,
            log_dir: None,
        };

        config.set_filter("danmu_relay=debug").unwrap();
        assert!(config.get_filter().contains("danmu_relay=debug"));
        assert!(config.set_filter("danmu_relay=notalevel").is_err());
        assert!(config.log_dir().is_none());
    }

    #[test]
    fn test_available_modules() {
        let modules = available_modules();
        assert!(modules.iter().any(|(name, _)| *name == "danmu_relay"));
        assert!(modules.iter().any(|(name, _)| *name == "danmaku"));
    }
}

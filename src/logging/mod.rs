//! Logging setup with a reloadable filter and local-time timestamps.
//!
//! The filter directive can be changed at runtime through
//! `LoggingConfig::set_filter` (exposed on the API); when `LOG_DIR` is set,
//! logs are additionally written to a daily-rotated file via
//! `tracing-appender`.

use chrono::Local;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    reload::{self, Handle},
    util::SubscriberInitExt,
};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "sysscope=info";

/// Custom timer formatting timestamps in the server's local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Type alias for the reload handle.
pub type FilterHandle = Handle<EnvFilter, tracing_subscriber::Registry>;

/// Runtime-reloadable logging configuration.
pub struct LoggingConfig {
    handle: FilterHandle,
}

impl LoggingConfig {
    /// Get the current filter directive string.
    pub fn get_filter(&self) -> String {
        self.handle
            .with_current(|filter| filter.to_string())
            .unwrap_or_default()
    }

    /// Set a new filter directive (e.g. "sysscope=debug").
    pub fn set_filter(&self, directive: &str) -> crate::Result<()> {
        let new_filter = EnvFilter::try_new(directive)
            .map_err(|e| crate::Error::Other(format!("Invalid filter directive: {}", e)))?;

        self.handle
            .reload(new_filter)
            .map_err(|e| crate::Error::Other(format!("Failed to reload filter: {}", e)))?;

        info!(directive = %directive, "Log filter updated");
        Ok(())
    }
}

/// Initialize the global subscriber.
///
/// Returns the reloadable config and, when file logging is enabled, the
/// appender guard that must be held for the process lifetime.
pub fn init() -> crate::Result<(LoggingConfig, Option<WorkerGuard>)> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let (filter_layer, handle) = reload::Layer::new(filter);

    let registry = tracing_subscriber::registry().with(filter_layer);
    let stdout_layer = fmt::layer().with_timer(LocalTimer);

    let guard = match std::env::var("LOG_DIR") {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir.trim(), "sysscope.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer()
                .with_timer(LocalTimer)
                .with_ansi(false)
                .with_writer(writer);
            registry.with(stdout_layer).with(file_layer).init();
            Some(guard)
        }
        _ => {
            registry.with(stdout_layer).init();
            None
        }
    };

    Ok((LoggingConfig { handle }, guard))
}

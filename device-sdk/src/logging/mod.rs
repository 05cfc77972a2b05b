//! Logging setup with a reloadable filter.
//!
//! Console output is always on. When a log directory is configured, a
//! daily-rotated file is written as well through a non-blocking writer.
//! Timestamps use the local timezone.

use std::path::PathBuf;
use std::sync::Arc;

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

use crate::config::LogSettings;
use crate::{Error, Result};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "device_sdk=info,device_contracts=info,reqwest=warn";

/// File name prefix of rotated log files.
pub const LOG_FILE_PREFIX: &str = "device-sdk.log";

/// Timer formatting timestamps in the local timezone.
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

/// Handle to the installed subscriber.
pub struct LoggingConfig {
    handle: FilterHandle,
    log_dir: Option<PathBuf>,
}

impl LoggingConfig {
    /// Get the current filter directive string.
    pub fn get_filter(&self) -> String {
        self.handle
            .with_current(|filter| filter.to_string())
            .unwrap_or_default()
    }

    /// Replace the filter directive, e.g. `device_sdk=debug`.
    pub fn set_filter(&self, directive: &str) -> Result<()> {
        let new_filter = parse_filter(directive)?;

        self.handle
            .reload(new_filter)
            .map_err(|e| Error::Other(format!("Failed to reload filter: {}", e)))?;

        info!(directive = %directive, "Log filter updated");
        Ok(())
    }

    pub fn log_dir(&self) -> Option<&PathBuf> {
        self.log_dir.as_ref()
    }
}

fn parse_filter(directive: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directive)
        .map_err(|e| Error::config(format!("Invalid filter directive: {}", e)))
}

/// Filter used at startup: `RUST_LOG`, then the configured directive, then
/// [`DEFAULT_LOG_FILTER`].
fn initial_filter(settings: &LogSettings) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    match settings.filter.as_deref() {
        Some(directive) => parse_filter(directive),
        None => Ok(EnvFilter::new(DEFAULT_LOG_FILTER)),
    }
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the lifetime of the process, otherwise
/// buffered file output is lost.
pub fn init_logging(settings: &LogSettings) -> Result<(Arc<LoggingConfig>, Option<WorkerGuard>)> {
    let (filter_layer, filter_handle) = reload::Layer::new(initial_filter(settings)?);

    let (file_layer, guard) = match &settings.log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir)?;
            let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
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
        .map_err(|e| Error::Other(format!("Failed to set global default subscriber: {}", e)))?;

    let config = Arc::new(LoggingConfig {
        handle: filter_handle,
        log_dir: settings.log_dir.clone(),
    });

    Ok((config, guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert!(DEFAULT_LOG_FILTER.contains("device_sdk=info"));
        assert!(DEFAULT_LOG_FILTER.contains("reqwest=warn"));
        assert!(parse_filter(DEFAULT_LOG_FILTER).is_ok());
    }

    #[test]
    fn test_parse_filter_rejects_garbage() {
        assert!(matches!(
            parse_filter("device_sdk=loud"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_reload_handle_roundtrip() {
        let (layer, handle) = reload::Layer::<EnvFilter, tracing_subscriber::Registry>::new(
            EnvFilter::new("device_sdk=info"),
        );
        let _subscriber = tracing_subscriber::registry().with(layer);
        let config = LoggingConfig {
            handle,
            log_dir: None,
        };

        config.set_filter("device_sdk=debug").unwrap();
        assert!(config.get_filter().contains("device_sdk=debug"));
        assert!(config.set_filter("device_sdk=loud").is_err());
        assert!(config.get_filter().contains("device_sdk=debug"));
    }
}

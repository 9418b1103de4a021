use std::{backtrace::Backtrace, sync::Once};

use serde::Deserialize;

/// Logger configuration
///
/// `filter` follows the `env_logger` filter syntax (e.g. "warn", "umbra_render=debug,wgpu=error").
/// When unset, `RUST_LOG` is consulted, then a default of `warn`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: Option<String>,
    pub color: bool,
}

static INIT: Once = Once::new();

/// Installs the global `env_logger` once; later calls are ignored
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = config.filter {
            builder.parse_filters(&filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.filter_level(log::LevelFilter::Warn);
        }

        builder.write_style(if config.color {
            env_logger::WriteStyle::Auto
        } else {
            env_logger::WriteStyle::Never
        });

        // a host application may already own the logger
        if builder.try_init().is_ok() {
            log::debug!("logging initialized");
        }
    });
}

/// Critical severity: logs at error level with a captured backtrace
///
/// Used right before a fatal [`RenderError`](crate::RenderError) is handed back
pub fn critical(context: &str, message: &str) {
    let backtrace = Backtrace::force_capture();
    log::error!("[CRITICAL] {context}: {message}\n{backtrace}");
}

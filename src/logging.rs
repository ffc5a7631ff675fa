use std::env;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::settings::config_dir;

pub const LOG_ENV: &str = "MEDLYTICS_LOG";

/// Log to `<config dir>/medlytics.log`. The terminal belongs to the
/// dashboard, so nothing is written to stdout. Keep the guard alive for the
/// life of the process or buffered lines are lost.
pub fn init_logger() -> Option<WorkerGuard> {
    let filter = env::var(LOG_ENV).unwrap_or_else(|_| "info".to_string());
    let filter_layer = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let dir = config_dir();
    if std::fs::create_dir_all(&dir).is_err() {
        return None;
    }
    let file_appender = tracing_appender::rolling::never(&dir, "medlytics.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let installed = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(filter_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(version = env!("CARGO_PKG_VERSION"), "logging started");
        Some(guard)
    } else {
        None
    }
}

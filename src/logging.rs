//! Logging and tracing initialization

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize structured logging based on configuration.
///
/// `RUST_LOG` takes precedence; otherwise the configured level applies to the
/// `bookpulse` crates.
pub fn init_logging(config: &SyncConfig) -> Result<()> {
    let log_level = config.log_level.to_tracing_level();

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("bookpulse={}", log_level)))
        .map_err(|e| SyncError::Config(format!("Failed to create log filter: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}

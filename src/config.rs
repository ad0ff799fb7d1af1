//! Configuration types for the synchronization client

use crate::error::{Result, SyncError};
use bookpulse_core_resilience::GovernorConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Log verbosity for [`crate::logging::init_logging`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl LogLevel {
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Main configuration for a synchronization subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Streaming event-source endpoint (bearer token rides as a query param)
    pub events_url: String,

    /// Base URL of the per-entity status query endpoint
    pub status_url: String,

    /// Seconds between polling cycles while in fallback
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Milliseconds to wait after a stream fault before starting the polling
    /// fallback; bounds total downtime without a tight reconnect loop
    #[serde(default = "default_fallback_delay_ms")]
    pub fallback_delay_ms: u64,

    /// Per-request timeout for point queries, so one slow entity cannot
    /// starve a polling tick
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Minimum seconds between two user-visible error notifications
    #[serde(default = "default_throttle_window_secs")]
    pub throttle_window_secs: u64,

    /// Consecutive connection-level failures before the circuit breaks
    #[serde(default = "default_failure_ceiling")]
    pub failure_ceiling: usize,

    /// Whether to degrade to polling when the stream is unavailable
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,

    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_fallback_delay_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_throttle_window_secs() -> u64 {
    60
}

fn default_failure_ceiling() -> usize {
    3
}

fn default_true() -> bool {
    true
}

impl SyncConfig {
    /// Configuration for the given endpoints with the reference policy
    /// (30s polls, 1s fallback delay, 60s throttle, ceiling of 3).
    pub fn new(events_url: impl Into<String>, status_url: impl Into<String>) -> Self {
        Self {
            events_url: events_url.into(),
            status_url: status_url.into(),
            poll_interval_secs: default_poll_interval_secs(),
            fallback_delay_ms: default_fallback_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            throttle_window_secs: default_throttle_window_secs(),
            failure_ceiling: default_failure_ceiling(),
            fallback_enabled: true,
            log_level: LogLevel::default(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn fallback_delay(&self) -> Duration {
        Duration::from_millis(self.fallback_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn throttle_window(&self) -> Duration {
        Duration::from_secs(self.throttle_window_secs)
    }

    /// The failure-governor slice of this configuration
    pub fn governor_config(&self) -> GovernorConfig {
        GovernorConfig {
            failure_ceiling: self.failure_ceiling,
            throttle_window: self.throttle_window(),
        }
    }

    /// Validate operational bounds before starting a subscription
    pub fn validate(&self) -> Result<()> {
        if self.events_url.is_empty() {
            return Err(SyncError::Config("events_url must not be empty".into()));
        }
        if self.status_url.is_empty() {
            return Err(SyncError::Config("status_url must not be empty".into()));
        }
        if self.poll_interval_secs == 0 {
            return Err(SyncError::Config("poll_interval_secs must be > 0".into()));
        }
        if self.failure_ceiling == 0 {
            return Err(SyncError::Config("failure_ceiling must be > 0".into()));
        }
        Ok(())
    }
}

//! Failure Governor: throttled surfacing and circuit breaking
//!
//! The governor is the single authority on what happens after a fault:
//! - **Suppress**: log it, but do not notify the user
//! - **Surface**: notify the user (at most once per throttle window)
//! - **Disable**: the fault is systemic; tear everything down and stop
//!   retrying until an explicit reset
//!
//! # Design
//!
//! The governor is a pure-logic state machine. It receives fault reports from
//! the caller and produces actions. The caller is responsible for logging
//! suppressed faults, invoking the user-visible error callback on `Surface`,
//! and tearing down transports on `Disable`.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Classification of a recorded fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A fault affecting the whole subscription (socket error, handshake
    /// rejection, missing credentials, all-entities-failed poll cycle)
    Connection,
    /// A fault scoped to one entity's point query
    Entity,
}

/// What the caller must do with a recorded fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Log the fault; do not invoke the error callback
    Suppress,
    /// Invoke the error callback (throttle window has elapsed)
    Surface,
    /// Circuit has broken: tear down all transports, stop retrying
    Disable,
}

/// Configuration for governor behavior
#[derive(Debug, Clone)]
pub struct GovernorConfig {
    /// Number of consecutive connection-level failures before the circuit
    /// breaks and the subscription is disabled
    pub failure_ceiling: usize,
    /// Minimum time between two user-visible error notifications
    pub throttle_window: Duration,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            failure_ceiling: 3,
            throttle_window: Duration::from_secs(60),
        }
    }
}

/// Tracks consecutive connection-level failures and rate-limits how often a
/// failure may become user-visible.
///
/// Entity-scoped faults never advance the circuit breaker and are never
/// surfaced; one flaky booking must not disable or poison the subscription.
#[derive(Debug)]
pub struct FailureGovernor {
    config: GovernorConfig,
    consecutive_failures: usize,
    /// Start of the current throttle window. Initialized at construction so
    /// the first failure after startup is suppressed rather than surfaced.
    last_surfaced_at: Instant,
    tripped: bool,
}

impl FailureGovernor {
    /// Create a new governor with the given configuration
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            config,
            consecutive_failures: 0,
            last_surfaced_at: Instant::now(),
            tripped: false,
        }
    }

    /// Create a new governor with default configuration
    pub fn new_default() -> Self {
        Self::new(GovernorConfig::default())
    }

    /// Current consecutive connection-level failure count
    pub fn consecutive_failures(&self) -> usize {
        self.consecutive_failures
    }

    /// Whether the circuit has broken
    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    /// Record a fault and decide what the caller must do with it.
    ///
    /// Connection-level faults advance the consecutive-failure count; once
    /// the count reaches the ceiling the circuit breaks and this method
    /// returns [`FailureAction::Disable`] for every connection-level fault
    /// until [`reset`](Self::reset) (or a recorded success) clears it.
    pub fn record_failure(&mut self, kind: FailureKind, message: &str) -> FailureAction {
        match kind {
            FailureKind::Entity => {
                debug!(reason = message, "entity-scoped fault suppressed");
                FailureAction::Suppress
            }
            FailureKind::Connection => {
                if self.tripped {
                    return FailureAction::Disable;
                }
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.config.failure_ceiling {
                    self.tripped = true;
                    debug!(
                        failures = self.consecutive_failures,
                        reason = message, "failure ceiling reached, circuit broken"
                    );
                    return FailureAction::Disable;
                }
                if self.last_surfaced_at.elapsed() > self.config.throttle_window {
                    self.last_surfaced_at = Instant::now();
                    FailureAction::Surface
                } else {
                    debug!(
                        failures = self.consecutive_failures,
                        reason = message, "connection fault suppressed by throttle window"
                    );
                    FailureAction::Suppress
                }
            }
        }
    }

    /// Record a successful connect or poll cycle.
    ///
    /// Resets the consecutive-failure count. Idempotent.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.tripped = false;
    }

    /// Fully reset the governor, including the throttle window.
    ///
    /// This is the manual-reconnect path out of a broken circuit.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.tripped = false;
        self.last_surfaced_at = Instant::now();
    }
}

//! Bookpulse Core Resilience: Pure-logic fault tolerance primitives
//!
//! # Overview
//!
//! This crate provides the failure policy used by the Bookpulse
//! synchronization client:
//!
//! - **Failure Governor**: decides, for every recorded fault, whether it may
//!   be surfaced to the user (throttling) or must disable the whole
//!   subscription (circuit breaking)
//!
//! # Key Principles
//!
//! This crate is **pure logic** with zero knowledge of:
//! - Network transports (HTTP, SSE)
//! - Async runtimes or task scheduling
//! - The booking domain
//!
//! The caller feeds it faults and successes; it answers with a
//! [`FailureAction`]. It never blocks and never performs I/O.
//!
//! # Usage Example
//!
//! ```
//! use bookpulse_core_resilience::{FailureAction, FailureGovernor, FailureKind, GovernorConfig};
//!
//! let mut governor = FailureGovernor::new(GovernorConfig::default());
//!
//! // A per-entity fault is never user-visible.
//! let action = governor.record_failure(FailureKind::Entity, "booking 7 query failed");
//! assert_eq!(action, FailureAction::Suppress);
//!
//! // A successful poll cycle resets the consecutive-failure window.
//! governor.record_success();
//! assert_eq!(governor.consecutive_failures(), 0);
//! ```

pub mod governor;

// Re-export main types for convenience
pub use governor::{FailureAction, FailureGovernor, FailureKind, GovernorConfig};

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use bookpulse_core_resilience::prelude::*;
/// ```
pub mod prelude {
    pub use super::governor::{FailureAction, FailureGovernor, FailureKind, GovernorConfig};
}

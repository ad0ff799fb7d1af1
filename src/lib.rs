//! Bookpulse: resilient booking-status synchronization
//!
//! # Overview
//!
//! Bookpulse keeps a caller-supplied set of bookings synchronized with a
//! remote authority. It consumes a live server-pushed event stream when it
//! can, degrades to fixed-interval polling when it cannot, throttles
//! user-visible failure notifications, and circuit-breaks once failures are
//! clearly systemic. All state is in-memory and scoped to the subscription.
//!
//! # Example
//!
//! ```no_run
//! use bookpulse::{HttpGateway, SyncConfig, SyncObserver, SyncOrchestrator, TrackedEntity};
//! use bookpulse::TokenProvider;
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl SyncObserver for Printer {
//!     fn on_update(&self, entity_id: i64, new_status: &str) {
//!         println!("booking {} is now {}", entity_id, new_status);
//!     }
//!     fn on_error(&self, message: &str) {
//!         eprintln!("sync trouble: {}", message);
//!     }
//! }
//!
//! struct StaticToken;
//!
//! impl TokenProvider for StaticToken {
//!     fn bearer_token(&self) -> Option<String> {
//!         std::env::var("BOOKPULSE_TOKEN").ok()
//!     }
//! }
//!
//! # async fn example() -> bookpulse::Result<()> {
//! let config = SyncConfig::new(
//!     "https://api.example.com/bookings/events",
//!     "https://api.example.com/bookings/status",
//! );
//! config.validate()?;
//!
//! let tokens = Arc::new(StaticToken);
//! let gateway = Arc::new(HttpGateway::new(
//!     config.events_url.clone(),
//!     config.status_url.clone(),
//!     tokens.clone(),
//!     config.request_timeout(),
//! )?);
//!
//! let sync = SyncOrchestrator::new(config, gateway, tokens, Arc::new(Printer));
//! sync.start(vec![
//!     TrackedEntity::new(101, "pending"),
//!     TrackedEntity::new(102, "confirmed"),
//! ])
//! .await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod sync;
pub mod tracker;

pub use config::{LogLevel, SyncConfig};
pub use error::{Result, SyncError};
pub use sync::{ConnectionState, SyncObserver, SyncOrchestrator, Transport};
pub use tracker::{TrackedEntity, TrackedSet};

// Re-export the seams callers implement or wire in.
pub use bookpulse_connect::{
    ConnectError, EventFrames, HttpGateway, StatusEvent, StatusGateway, StatusRecord,
    TokenProvider,
};
pub use bookpulse_core_resilience::{FailureAction, FailureGovernor, FailureKind, GovernorConfig};

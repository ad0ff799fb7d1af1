//! Bookpulse Connect: client-side transports for booking-status delivery
//!
//! This crate owns everything that talks to the remote authority:
//!
//! - [`wire`] — the closed tagged event envelope and the incremental SSE
//!   frame decoder
//! - [`gateway`] — the trait seams ([`StatusGateway`], [`TokenProvider`]) and
//!   the reqwest-backed [`HttpGateway`]
//! - [`stream`] — the Stream Transport Manager (one authenticated, long-lived
//!   event connection)
//! - [`poll`] — the Polling Fallback Manager (fixed-interval fan-out point
//!   queries)
//! - [`signal`] — the messages both transports publish to the orchestrator
//!
//! Transports never invoke user callbacks and never decide failure policy;
//! they publish [`Signal`]s and return errors to the orchestrator, which owns
//! the tracked set, the deduplicator, and the failure governor.

pub mod error;
pub mod gateway;
pub mod poll;
pub mod signal;
pub mod stream;
pub mod wire;

pub use error::ConnectError;
pub use gateway::{EventFrames, HttpGateway, StatusGateway, TokenProvider};
pub use poll::PollWorker;
pub use signal::{Signal, StatusEvent};
pub use stream::StreamTransport;
pub use wire::{Envelope, SseDecoder, StatusRecord};

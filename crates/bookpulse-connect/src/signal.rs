//! Signals published by the transports to the orchestrator's dispatch loop
//!
//! Both transports are producers on one mpsc channel whose sole consumer is
//! the orchestrator engine. The engine owns the tracked set and the failure
//! governor, applies deduplication, and invokes the caller's callbacks —
//! preserving single-writer, ordered-delivery semantics.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A status observation produced by either transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub entity_id: i64,
    pub status: String,
    pub observed_at: DateTime<Utc>,
}

/// Messages flowing from the transports to the orchestrator
#[derive(Debug)]
pub enum Signal {
    /// The stream handshake succeeded
    StreamConnected,
    /// One entity's (possibly unchanged) status was observed
    Status(StatusEvent),
    /// One entity's point query failed; never user-visible
    EntityFault { id: i64, message: String },
    /// A fault affecting the whole subscription (systemic poll tick)
    ConnectionFault { message: String },
    /// A poll tick where at least one query succeeded
    PollCycleOk,
}

/// Push one signal toward the engine, yielding to cancellation.
///
/// A plain `send().await` on a full channel would keep a cancelled producer
/// blocked past its cancel point, and the engine stops draining the channel
/// once it observes cancellation. Returns `false` when the run should end:
/// the engine is gone, or the token fired while the send was waiting for
/// capacity.
pub(crate) async fn forward(
    tx: &mpsc::Sender<Signal>,
    cancel: &CancellationToken,
    sig: Signal,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(sig) => sent.is_ok(),
    }
}

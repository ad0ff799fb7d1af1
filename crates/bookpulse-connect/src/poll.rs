//! Polling Fallback Manager: fixed-interval point queries
//!
//! When the live stream is unavailable the orchestrator runs this worker
//! instead. Each tick issues one point query per tracked entity,
//! concurrently, with independent completion handling: one slow or broken
//! entity neither blocks nor fails the others.
//!
//! Fault classification per tick:
//! - a single entity's query failing emits [`Signal::EntityFault`] (logged by
//!   the orchestrator, never user-visible);
//! - every query failing emits one [`Signal::ConnectionFault`] — a systemic
//!   problem, counted by the failure governor;
//! - otherwise the tick emits [`Signal::PollCycleOk`] so the governor's
//!   consecutive-failure window resets.
//!
//! The worker never stops itself (except for an empty tracked snapshot, where
//! no timer is started); the orchestrator cancels it and awaits its task
//! before starting a replacement, so two timers never overlap.

use crate::error::ConnectError;
use crate::gateway::StatusGateway;
use crate::signal::{self, Signal, StatusEvent};
use chrono::Utc;
use futures::future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct PollWorker {
    gateway: Arc<dyn StatusGateway>,
    interval: Duration,
    request_timeout: Duration,
}

impl PollWorker {
    pub fn new(
        gateway: Arc<dyn StatusGateway>,
        interval: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            interval,
            request_timeout,
        }
    }

    /// Poll the given tracked snapshot until cancelled.
    ///
    /// Returns immediately, without starting a timer, when the snapshot is
    /// empty. The first tick fires right away; later ticks follow the
    /// configured interval.
    pub async fn run(self, ids: Vec<i64>, cancel: CancellationToken, tx: mpsc::Sender<Signal>) {
        if ids.is_empty() {
            debug!("no tracked entities, polling not started");
            return;
        }
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            self.tick(&ids, &cancel, &tx).await;
        }
    }

    /// Execute one polling cycle over the tracked snapshot.
    async fn tick(&self, ids: &[i64], cancel: &CancellationToken, tx: &mpsc::Sender<Signal>) {
        let queries = ids.iter().map(|&id| {
            let gateway = Arc::clone(&self.gateway);
            let timeout = self.request_timeout;
            async move {
                let result = match tokio::time::timeout(timeout, gateway.fetch_status(id)).await {
                    Ok(result) => result,
                    Err(_) => Err(ConnectError::Timeout),
                };
                (id, result)
            }
        });

        // A tick superseded by stop()/restart must not publish its results.
        let results = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            results = future::join_all(queries) => results,
        };

        let total = results.len();
        let mut failures = 0;
        for (id, result) in results {
            match result {
                Ok(record) => {
                    let event = StatusEvent {
                        entity_id: record.id,
                        status: record.status,
                        observed_at: Utc::now(),
                    };
                    if !signal::forward(tx, cancel, Signal::Status(event)).await {
                        return;
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!(entity = id, error = %e, "status poll failed");
                    let message = format!("status poll for entity {} failed: {}", id, e);
                    if !signal::forward(tx, cancel, Signal::EntityFault { id, message }).await {
                        return;
                    }
                }
            }
        }

        let outcome = if failures == total {
            Signal::ConnectionFault {
                message: format!("all {} status polls failed this cycle", total),
            }
        } else {
            Signal::PollCycleOk
        };
        let _ = signal::forward(tx, cancel, outcome).await;
    }
}

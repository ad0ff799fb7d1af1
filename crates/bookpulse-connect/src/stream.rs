//! Stream Transport Manager: the live event-source connection
//!
//! Opens one authenticated, long-lived event connection and pumps decoded
//! envelopes into the orchestrator's signal channel. `status-update` frames
//! fan out as [`Signal::Status`] observations; `heartbeat` frames only prove
//! liveness; a server `error` frame or any transport-level fault ends the run
//! with an error, and the orchestrator decides what happens next (fallback,
//! throttled surfacing, or circuit break).
//!
//! Malformed individual frames are logged and skipped; they never tear down
//! the connection. The connection resource is released on every exit path —
//! dropping the frame stream closes it.

use crate::error::ConnectError;
use crate::gateway::{StatusGateway, TokenProvider};
use crate::signal::{self, Signal, StatusEvent};
use crate::wire::{self, Envelope};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct StreamTransport {
    gateway: Arc<dyn StatusGateway>,
    tokens: Arc<dyn TokenProvider>,
}

impl StreamTransport {
    pub fn new(gateway: Arc<dyn StatusGateway>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self { gateway, tokens }
    }

    /// Run the connection until it fails, the server signals a fault, or the
    /// token is cancelled.
    ///
    /// Returns `Ok(())` only on cancellation (or when the orchestrator has
    /// gone away); every fault path returns the `ConnectError` that ended the
    /// connection. Fails immediately with [`ConnectError::MissingToken`] when
    /// the credential provider has no token.
    pub async fn run(
        self,
        cancel: CancellationToken,
        tx: mpsc::Sender<Signal>,
    ) -> Result<(), ConnectError> {
        let token = self.tokens.bearer_token().ok_or(ConnectError::MissingToken)?;

        let mut frames = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            opened = self.gateway.open_event_stream(&token) => opened?,
        };

        info!("event stream connected");
        if !signal::forward(&tx, &cancel, Signal::StreamConnected).await {
            return Ok(());
        }

        let mut last_heartbeat = Instant::now();
        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                frame = frames.next() => frame,
            };
            let payload = match frame {
                None => return Err(ConnectError::StreamClosed),
                Some(Err(e)) => return Err(e),
                Some(Ok(payload)) => payload,
            };
            match Envelope::decode(&payload) {
                Ok(Envelope::StatusUpdate { data, timestamp }) => {
                    let observed_at = wire::event_time(timestamp);
                    for record in data {
                        let event = StatusEvent {
                            entity_id: record.id,
                            status: record.status,
                            observed_at,
                        };
                        if !signal::forward(&tx, &cancel, Signal::Status(event)).await {
                            return Ok(());
                        }
                    }
                }
                Ok(Envelope::Heartbeat { .. }) => {
                    debug!(
                        since_last_ms = last_heartbeat.elapsed().as_millis() as u64,
                        "heartbeat"
                    );
                    last_heartbeat = Instant::now();
                }
                Ok(Envelope::Error { message, .. }) => {
                    return Err(ConnectError::Server(message));
                }
                Err(e) => {
                    warn!(error = %e, "skipping malformed event frame");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::EventFrames;
    use crate::wire::StatusRecord;
    use async_trait::async_trait;
    use futures::stream;
    use std::time::Duration;

    struct FixedToken(Option<&'static str>);

    impl TokenProvider for FixedToken {
        fn bearer_token(&self) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    /// Gateway whose event stream replays a fixed script of frames, then ends.
    struct ScriptedGateway {
        frames: std::sync::Mutex<Option<Vec<Result<String, ConnectError>>>>,
    }

    impl ScriptedGateway {
        fn new(frames: Vec<Result<String, ConnectError>>) -> Self {
            Self {
                frames: std::sync::Mutex::new(Some(frames)),
            }
        }
    }

    #[async_trait]
    impl StatusGateway for ScriptedGateway {
        async fn open_event_stream(&self, _token: &str) -> Result<EventFrames, ConnectError> {
            let frames = self
                .frames
                .lock()
                .unwrap()
                .take()
                .expect("stream opened twice");
            Ok(Box::pin(stream::iter(frames)))
        }

        async fn fetch_status(&self, _id: i64) -> Result<StatusRecord, ConnectError> {
            unreachable!("stream transport never polls")
        }
    }

    fn update_frame(id: i64, status: &str) -> String {
        format!(
            r#"{{"type":"status-update","data":[{{"id":{},"status":"{}"}}],"timestamp":1700000000000}}"#,
            id, status
        )
    }

    async fn run_transport(
        gateway: ScriptedGateway,
        token: Option<&'static str>,
    ) -> (Result<(), ConnectError>, Vec<Signal>) {
        let transport = StreamTransport::new(Arc::new(gateway), Arc::new(FixedToken(token)));
        let (tx, mut rx) = mpsc::channel(32);
        let result = transport.run(CancellationToken::new(), tx).await;
        let mut signals = Vec::new();
        while let Ok(sig) = rx.try_recv() {
            signals.push(sig);
        }
        (result, signals)
    }

    #[tokio::test]
    async fn missing_token_fails_immediately() {
        let gateway = ScriptedGateway::new(vec![]);
        let (result, signals) = run_transport(gateway, None).await;
        assert!(matches!(result, Err(ConnectError::MissingToken)));
        assert!(signals.is_empty());
    }

    #[tokio::test]
    async fn dispatches_status_updates_in_frame_order() {
        let gateway = ScriptedGateway::new(vec![
            Ok(update_frame(1, "confirmed")),
            Ok(update_frame(2, "cancelled")),
        ]);
        let (result, signals) = run_transport(gateway, Some("tok")).await;
        // Script ends -> the server closed the stream.
        assert!(matches!(result, Err(ConnectError::StreamClosed)));
        assert!(matches!(signals[0], Signal::StreamConnected));
        match (&signals[1], &signals[2]) {
            (Signal::Status(a), Signal::Status(b)) => {
                assert_eq!((a.entity_id, a.status.as_str()), (1, "confirmed"));
                assert_eq!((b.entity_id, b.status.as_str()), (2, "cancelled"));
            }
            other => panic!("expected two status signals, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_frames_are_skipped() {
        let gateway = ScriptedGateway::new(vec![
            Ok("not json".to_string()),
            Ok(r#"{"type":"resync","timestamp":1}"#.to_string()),
            Ok(update_frame(5, "pending")),
        ]);
        let (_, signals) = run_transport(gateway, Some("tok")).await;
        let updates: Vec<_> = signals
            .iter()
            .filter(|s| matches!(s, Signal::Status(_)))
            .collect();
        assert_eq!(updates.len(), 1);
    }

    #[tokio::test]
    async fn server_error_frame_ends_the_connection() {
        let gateway = ScriptedGateway::new(vec![
            Ok(r#"{"type":"error","message":"subscription expired","timestamp":1}"#.to_string()),
            Ok(update_frame(9, "never-seen")),
        ]);
        let (result, signals) = run_transport(gateway, Some("tok")).await;
        match result {
            Err(ConnectError::Server(msg)) => assert_eq!(msg, "subscription expired"),
            other => panic!("expected Server error, got {:?}", other),
        }
        // Nothing after the fault frame was dispatched.
        assert!(!signals.iter().any(|s| matches!(s, Signal::Status(_))));
    }

    #[tokio::test]
    async fn heartbeats_require_no_caller_action() {
        let gateway = ScriptedGateway::new(vec![Ok(
            r#"{"type":"heartbeat","timestamp":1700000000000}"#.to_string()
        )]);
        let (_, signals) = run_transport(gateway, Some("tok")).await;
        assert_eq!(signals.len(), 1);
        assert!(matches!(signals[0], Signal::StreamConnected));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_unblocks_a_send_on_a_full_channel() {
        let gateway = ScriptedGateway::new(vec![
            Ok(update_frame(1, "confirmed")),
            Ok(update_frame(2, "cancelled")),
        ]);
        let transport =
            StreamTransport::new(Arc::new(gateway), Arc::new(FixedToken(Some("tok"))));
        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(transport.run(cancel.clone(), tx));

        // `StreamConnected` fills the channel; with nobody draining it the
        // transport is parked mid-send on the first status.
        assert!(matches!(rx.recv().await, Some(Signal::StreamConnected)));

        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("cancelled transport stayed blocked on the signal channel")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn cancellation_ends_the_run_cleanly() {
        let gateway = ScriptedGateway::new(vec![Ok(update_frame(1, "confirmed"))]);
        let transport =
            StreamTransport::new(Arc::new(gateway), Arc::new(FixedToken(Some("tok"))));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (tx, _rx) = mpsc::channel(32);
        let result = transport.run(cancel, tx).await;
        assert!(result.is_ok());
    }
}

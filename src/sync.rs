//! Synchronization Orchestrator: lifecycle and transport selection
//!
//! One [`SyncOrchestrator`] owns one logical subscription. Starting it
//! attempts the live event stream first; any stream fault is routed through
//! the failure governor and, unless the circuit breaks, hands off to the
//! polling fallback after a short fixed delay. The two transports never run
//! concurrently for the same subscription.
//!
//! Internally the orchestrator spawns a single engine task that is the sole
//! consumer of the transports' signal channel: it applies deduplication
//! against the tracked set, commits dispatched statuses, and invokes the
//! caller's callbacks — so delivery is single-writer and ordered, and
//! `stop()` (which cancels and awaits the engine) guarantees that no callback
//! fires after it returns.

use crate::config::SyncConfig;
use crate::tracker::{TrackedEntity, TrackedSet};
use bookpulse_connect::{
    ConnectError, PollWorker, Signal, StatusGateway, StreamTransport, TokenProvider,
};
use bookpulse_core_resilience::{FailureAction, FailureGovernor, FailureKind};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle state of a subscription. `StreamActive` and `PollingActive` are
/// mutually exclusive: a single engine task owns every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No subscription running
    Idle,
    /// Stream handshake in progress
    Connecting,
    /// Live event stream delivering updates
    StreamActive,
    /// Polling fallback delivering updates
    PollingActive,
    /// Circuit broken; only [`SyncOrchestrator::reconnect`] leaves this state
    Disabled,
}

/// Which delivery mechanism is currently active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stream,
    Poll,
    None,
}

/// Caller-injected callbacks.
///
/// Invoked only by the engine's dispatch loop: `on_update` for novel statuses
/// that passed deduplication, `on_error` for faults the governor decided to
/// surface.
pub trait SyncObserver: Send + Sync {
    fn on_update(&self, entity_id: i64, new_status: &str);
    fn on_error(&self, message: &str);
}

struct RunHandle {
    /// Sorted ids of the set this run was started with, for the
    /// same-set no-op check
    tracked_ids: Vec<i64>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    cmd_tx: mpsc::Sender<Vec<TrackedEntity>>,
}

/// Public entry point: owns the subscription lifecycle
pub struct SyncOrchestrator {
    config: SyncConfig,
    gateway: Arc<dyn StatusGateway>,
    tokens: Arc<dyn TokenProvider>,
    observer: Arc<dyn SyncObserver>,
    governor: Arc<Mutex<FailureGovernor>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    state_rx: watch::Receiver<ConnectionState>,
    run: AsyncMutex<Option<RunHandle>>,
    /// Last tracked set supplied by the caller, for `reconnect()`
    tracked: AsyncMutex<Vec<TrackedEntity>>,
}

impl SyncOrchestrator {
    pub fn new(
        config: SyncConfig,
        gateway: Arc<dyn StatusGateway>,
        tokens: Arc<dyn TokenProvider>,
        observer: Arc<dyn SyncObserver>,
    ) -> Self {
        let governor = Arc::new(Mutex::new(FailureGovernor::new(config.governor_config())));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        Self {
            config,
            gateway,
            tokens,
            observer,
            governor,
            state_tx: Arc::new(state_tx),
            state_rx,
            run: AsyncMutex::new(None),
            tracked: AsyncMutex::new(Vec::new()),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Whether either transport is currently delivering updates
    pub fn is_connected(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::StreamActive | ConnectionState::PollingActive
        )
    }

    /// The active delivery mechanism, for connectivity affordances
    pub fn active_transport(&self) -> Transport {
        match self.state() {
            ConnectionState::StreamActive => Transport::Stream,
            ConnectionState::PollingActive => Transport::Poll,
            _ => Transport::None,
        }
    }

    /// Start synchronizing the given tracked set.
    ///
    /// No-op when the subscription is `Disabled` (use
    /// [`reconnect`](Self::reconnect)) or already running for the same ids.
    /// Otherwise any prior run is stopped first.
    pub async fn start(&self, entities: Vec<TrackedEntity>) {
        if self.state() == ConnectionState::Disabled {
            debug!("subscription disabled; ignoring start (reconnect required)");
            return;
        }

        let mut ids: Vec<i64> = entities.iter().map(|e| e.id).collect();
        ids.sort_unstable();

        let mut run = self.run.lock().await;
        if let Some(handle) = run.as_ref() {
            if handle.tracked_ids == ids && !handle.task.is_finished() {
                debug!("already synchronizing this tracked set");
                return;
            }
        }
        if let Some(handle) = run.take() {
            shutdown(handle).await;
        }

        *self.tracked.lock().await = entities.clone();

        info!(entities = entities.len(), "starting synchronization");
        self.state_tx.send_replace(ConnectionState::Connecting);

        let cancel = CancellationToken::new();
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let engine = Engine {
            gateway: Arc::clone(&self.gateway),
            tokens: Arc::clone(&self.tokens),
            observer: Arc::clone(&self.observer),
            governor: Arc::clone(&self.governor),
            state: Arc::clone(&self.state_tx),
            poll_interval: self.config.poll_interval(),
            fallback_delay: self.config.fallback_delay(),
            request_timeout: self.config.request_timeout(),
            fallback_enabled: self.config.fallback_enabled,
        };
        let tracked = TrackedSet::new(entities);
        let task = tokio::spawn(engine.run(tracked, cancel.clone(), cmd_rx));
        *run = Some(RunHandle {
            tracked_ids: ids,
            cancel,
            task,
            cmd_tx,
        });
    }

    /// Tear down whichever transport is active and release all resources.
    ///
    /// Safe to call from any state and idempotent. When this returns, no
    /// further callback will fire. A `Disabled` subscription stays `Disabled`
    /// (stopping does not forgive the circuit breaker).
    pub async fn stop(&self) {
        let mut run = self.run.lock().await;
        if let Some(handle) = run.take() {
            shutdown(handle).await;
        }
        if self.state() != ConnectionState::Disabled {
            self.state_tx.send_replace(ConnectionState::Idle);
        }
    }

    /// Stop, reset the failure governor, and start again with the last
    /// tracked set — the only way out of `Disabled`.
    pub async fn reconnect(&self) {
        info!("manual reconnect requested");
        {
            let mut run = self.run.lock().await;
            if let Some(handle) = run.take() {
                shutdown(handle).await;
            }
        }
        self.governor.lock().unwrap().reset();
        self.state_tx.send_replace(ConnectionState::Idle);
        let entities = self.tracked.lock().await.clone();
        self.start(entities).await;
    }

    /// Replace the tracked set wholesale.
    ///
    /// While polling, the fallback worker is restarted with the new set (the
    /// old timer fully stops first). While streaming, the connection already
    /// covers every entity the server associates with the credential.
    pub async fn set_tracked(&self, entities: Vec<TrackedEntity>) {
        *self.tracked.lock().await = entities.clone();
        let mut run = self.run.lock().await;
        if let Some(handle) = run.as_mut() {
            handle.tracked_ids = {
                let mut ids: Vec<i64> = entities.iter().map(|e| e.id).collect();
                ids.sort_unstable();
                ids
            };
            if handle.cmd_tx.send(entities).await.is_err() {
                debug!("engine already finished; tracked set applies on next start");
            }
        }
    }
}

async fn shutdown(handle: RunHandle) {
    handle.cancel.cancel();
    let _ = handle.task.await;
}

/// Outcome of dispatching one signal
#[derive(PartialEq)]
enum Flow {
    Continue,
    Disable,
}

/// The single task that supervises transports and dispatches to the caller
struct Engine {
    gateway: Arc<dyn StatusGateway>,
    tokens: Arc<dyn TokenProvider>,
    observer: Arc<dyn SyncObserver>,
    governor: Arc<Mutex<FailureGovernor>>,
    state: Arc<watch::Sender<ConnectionState>>,
    poll_interval: Duration,
    fallback_delay: Duration,
    request_timeout: Duration,
    fallback_enabled: bool,
}

impl Engine {
    async fn run(
        self,
        mut tracked: TrackedSet,
        cancel: CancellationToken,
        mut cmd_rx: mpsc::Receiver<Vec<TrackedEntity>>,
    ) {
        let (sig_tx, mut sig_rx) = mpsc::channel::<Signal>(64);

        // Phase 1: the live stream.
        let stream_cancel = cancel.child_token();
        let transport = StreamTransport::new(Arc::clone(&self.gateway), Arc::clone(&self.tokens));
        let mut stream_task = tokio::spawn(transport.run(stream_cancel.clone(), sig_tx.clone()));

        let stream_fault: ConnectError = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    stream_cancel.cancel();
                    let _ = (&mut stream_task).await;
                    return;
                }
                joined = &mut stream_task => {
                    match joined {
                        Ok(Ok(())) => return,
                        Ok(Err(e)) => break e,
                        Err(e) => break ConnectError::Server(format!("stream task failed: {}", e)),
                    }
                }
                Some(entities) = cmd_rx.recv() => {
                    // No restart needed while streaming; the connection covers
                    // whatever the credential maps to server-side.
                    tracked = TrackedSet::new(entities);
                }
                Some(sig) = sig_rx.recv() => {
                    if self.dispatch(sig, &mut tracked) == Flow::Disable {
                        stream_cancel.cancel();
                        let _ = (&mut stream_task).await;
                        self.state.send_replace(ConnectionState::Disabled);
                        return;
                    }
                }
            }
        };

        // Drain anything the stream published before it fell over, so updates
        // are not lost across the handoff.
        while let Ok(sig) = sig_rx.try_recv() {
            if self.dispatch(sig, &mut tracked) == Flow::Disable {
                self.state.send_replace(ConnectionState::Disabled);
                return;
            }
        }

        warn!(error = %stream_fault, "stream transport failed");
        if self.on_connection_fault(&stream_fault.to_string()) == Flow::Disable {
            self.state.send_replace(ConnectionState::Disabled);
            return;
        }

        if !self.fallback_enabled {
            info!("polling fallback disabled; subscription idle until restarted");
            self.state.send_replace(ConnectionState::Idle);
            return;
        }

        // Short fixed delay before falling back, to avoid a tight loop.
        self.state.send_replace(ConnectionState::Connecting);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(self.fallback_delay) => {}
        }

        // Phase 2: polling fallback; restarted whenever the set changes.
        loop {
            let poll_cancel = cancel.child_token();
            let worker = PollWorker::new(
                Arc::clone(&self.gateway),
                self.poll_interval,
                self.request_timeout,
            );
            let mut poll_task =
                tokio::spawn(worker.run(tracked.ids(), poll_cancel.clone(), sig_tx.clone()));
            self.state.send_replace(ConnectionState::PollingActive);
            info!(entities = tracked.len(), "polling fallback active");

            let mut worker_done = false;
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        poll_cancel.cancel();
                        if !worker_done {
                            let _ = (&mut poll_task).await;
                        }
                        return;
                    }
                    joined = &mut poll_task, if !worker_done => {
                        // Only an empty snapshot ends the worker on its own;
                        // park here until the set changes or we are stopped.
                        let _ = joined;
                        worker_done = true;
                    }
                    Some(entities) = cmd_rx.recv() => {
                        tracked = TrackedSet::new(entities);
                        poll_cancel.cancel();
                        if !worker_done {
                            let _ = (&mut poll_task).await;
                        }
                        // Anything the superseded worker already published
                        // predates the new set; the replacement's first tick
                        // re-observes everything.
                        while sig_rx.try_recv().is_ok() {}
                        break;
                    }
                    Some(sig) = sig_rx.recv() => {
                        if self.dispatch(sig, &mut tracked) == Flow::Disable {
                            poll_cancel.cancel();
                            if !worker_done {
                                let _ = (&mut poll_task).await;
                            }
                            self.state.send_replace(ConnectionState::Disabled);
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Apply one transport signal: deduplicate, commit, notify, govern.
    fn dispatch(&self, sig: Signal, tracked: &mut TrackedSet) -> Flow {
        match sig {
            Signal::StreamConnected => {
                self.governor.lock().unwrap().record_success();
                self.state.send_replace(ConnectionState::StreamActive);
                Flow::Continue
            }
            Signal::Status(event) => {
                if tracked.should_dispatch(event.entity_id, &event.status) {
                    tracked.commit(event.entity_id, &event.status);
                    debug!(entity = event.entity_id, status = %event.status, "status update");
                    self.observer.on_update(event.entity_id, &event.status);
                }
                Flow::Continue
            }
            Signal::EntityFault { id, message } => {
                // Always Suppress: one flaky booking must not poison the UI.
                let action = self
                    .governor
                    .lock()
                    .unwrap()
                    .record_failure(FailureKind::Entity, &message);
                debug!(entity = id, ?action, "entity fault");
                Flow::Continue
            }
            Signal::PollCycleOk => {
                self.governor.lock().unwrap().record_success();
                Flow::Continue
            }
            Signal::ConnectionFault { message } => self.on_connection_fault(&message),
        }
    }

    fn on_connection_fault(&self, message: &str) -> Flow {
        let action = self
            .governor
            .lock()
            .unwrap()
            .record_failure(FailureKind::Connection, message);
        match action {
            FailureAction::Disable => {
                warn!(reason = message, "failure ceiling reached; disabling subscription");
                Flow::Disable
            }
            FailureAction::Surface => {
                self.observer.on_error(message);
                Flow::Continue
            }
            FailureAction::Suppress => {
                warn!(reason = message, "connection fault suppressed");
                Flow::Continue
            }
        }
    }
}

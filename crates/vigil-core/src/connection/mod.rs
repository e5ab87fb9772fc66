// ── Connection manager ──
//
// Owns the one live STOMP session of an operator session: connect,
// graceful teardown, and backoff-driven reconnection. Consumers observe
// `connected` and `ConnectionState` through watch channels and send frames
// through `Publisher`; they never touch the socket.

mod backoff;
mod task;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use vigil_api::websocket::{self, SessionOptions};
use vigil_api::{Endpoint, Frame, Headers};

use crate::config::SessionConfig;
use crate::error::CoreError;
use crate::router::SubscriptionRouter;
use crate::rpc::{Publisher, RpcCorrelator, RpcError, RpcRequest};

pub use backoff::{ReconnectConfig, backoff_delay};
use task::{SessionEnd, SessionIo, run_session};

/// How long `disconnect` waits for the session task to say goodbye.
const TEARDOWN_GRACE: Duration = Duration::from_secs(2);

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

#[derive(Default)]
struct RetryState {
    attempt: u32,
    /// Set by `disconnect`, cleared by `connect`/`reconnect`.
    explicitly_closed: bool,
    timer: Option<JoinHandle<()>>,
}

struct SessionHandle {
    generation: u64,
    outbound: mpsc::UnboundedSender<Frame>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

// ── ConnectionManager ────────────────────────────────────────────

/// Connection lifecycle for one gateway node.
///
/// Cheaply cloneable via `Arc<ManagerInner>`. Background tasks hold only
/// weak references, so dropping every clone lets them wind down.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    endpoint: Endpoint,
    token: Option<String>,
    options: SessionOptions,
    reconnect: ReconnectConfig,
    router: Arc<SubscriptionRouter>,
    correlator: Arc<RpcCorrelator>,
    state: watch::Sender<ConnectionState>,
    connected: watch::Sender<bool>,
    retry: Mutex<RetryState>,
    session: Mutex<Option<SessionHandle>>,
    generation: AtomicU64,
    /// Serializes handshakes so at most one transport is live.
    handshake: tokio::sync::Mutex<()>,
}

impl ConnectionManager {
    pub fn new(
        config: &SessionConfig,
        router: Arc<SubscriptionRouter>,
        correlator: Arc<RpcCorrelator>,
    ) -> Self {
        let endpoint = config.endpoint();
        let host = endpoint
            .gateway()
            .host_str()
            .unwrap_or("localhost")
            .to_owned();
        let mut options = SessionOptions::new(host).with_token(config.token.clone());
        options.heartbeat_outgoing = config.heartbeat;
        options.connect_timeout = config.connect_timeout;

        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (connected, _) = watch::channel(false);

        Self {
            inner: Arc::new(ManagerInner {
                endpoint,
                token: config.token_str().map(str::to_owned),
                options,
                reconnect: config.reconnect.clone(),
                router,
                correlator,
                state,
                connected,
                retry: Mutex::new(RetryState::default()),
                session: Mutex::new(None),
                generation: AtomicU64::new(0),
                handshake: tokio::sync::Mutex::new(()),
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Open a session, replacing any existing one.
    ///
    /// On failure the error is returned and, like any lost session, a
    /// reconnect is scheduled.
    pub async fn connect(&self) -> Result<(), CoreError> {
        {
            let mut retry = self.inner.retry();
            retry.explicitly_closed = false;
            if let Some(timer) = retry.timer.take() {
                timer.abort();
            }
        }
        self.inner.establish().await.map_err(CoreError::from)
    }

    /// Clear the latch and the attempt counter, then connect.
    pub async fn reconnect(&self) -> Result<(), CoreError> {
        self.inner.retry().attempt = 0;
        self.connect().await
    }

    /// Terminal teardown: no reconnect is scheduled until `connect` or
    /// `reconnect`. Pending requests fail with `Disconnected`.
    pub async fn disconnect(&self) {
        {
            let mut retry = self.inner.retry();
            retry.explicitly_closed = true;
            if let Some(timer) = retry.timer.take() {
                timer.abort();
            }
        }
        self.inner.teardown().await;
        self.inner.connected.send_replace(false);
        self.inner.set_state(ConnectionState::Disconnected);
        let drained = self.inner.correlator.drain();
        tracing::info!(drained, "disconnected");
    }

    // ── Observation ──────────────────────────────────────────────

    pub fn is_connected(&self) -> bool {
        *self.inner.connected.borrow()
    }

    /// Subscribe to the connected flag.
    pub fn connected(&self) -> watch::Receiver<bool> {
        self.inner.connected.subscribe()
    }

    /// Subscribe to connection state changes.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Reconnect attempts since the last successful connect.
    pub fn attempt(&self) -> u32 {
        self.inner.retry().attempt
    }

    pub fn correlator(&self) -> &Arc<RpcCorrelator> {
        &self.inner.correlator
    }

    // ── Sending ──────────────────────────────────────────────────

    /// Correlated request over the live session.
    pub async fn request(&self, request: RpcRequest) -> Result<Value, RpcError> {
        self.inner.correlator.request(self, request).await
    }
}

impl Publisher for ConnectionManager {
    fn is_connected(&self) -> bool {
        ConnectionManager::is_connected(self)
    }

    fn publish(&self, destination: &str, headers: Headers, body: String) -> Result<(), CoreError> {
        let session = self.inner.session();
        let handle = session.as_ref().ok_or(CoreError::NotConnected)?;
        handle
            .outbound
            .send(Frame::send(destination, headers, body))
            .map_err(|_| CoreError::NotConnected)
    }
}

// ── Internals ────────────────────────────────────────────────────

impl ManagerInner {
    fn retry(&self) -> MutexGuard<'_, RetryState> {
        self.retry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn session(&self) -> MutexGuard<'_, Option<SessionHandle>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = ?previous, to = ?state, "connection state");
        }
    }

    async fn establish(self: &Arc<Self>) -> Result<(), vigil_api::Error> {
        let _handshake = self.handshake.lock().await;
        self.teardown().await;

        let attempt = self.retry().attempt;
        self.set_state(if attempt == 0 {
            ConnectionState::Connecting
        } else {
            ConnectionState::Reconnecting { attempt }
        });

        let opened = match self.endpoint.websocket_url(self.token.as_deref()) {
            Ok(url) => websocket::open(&url, &self.options).await,
            Err(e) => Err(e),
        };
        let (writer, reader, _connected) = match opened {
            Ok(parts) => parts,
            Err(e) => {
                tracing::warn!(error = %e, attempt, "connect failed");
                self.connection_lost();
                return Err(e);
            }
        };

        let mut io = Some((writer, reader));
        {
            let mut session = self.session();
            if !self.retry().explicitly_closed {
                if let Some((writer, reader)) = io.take() {
                    *session = Some(self.spawn_session(writer, reader));
                    self.retry().attempt = 0;
                    self.connected.send_replace(true);
                    self.set_state(ConnectionState::Connected);
                }
            }
        }

        match io {
            Some((mut writer, _)) => {
                // `disconnect` raced the handshake.
                writer.close().await;
                tracing::debug!("session opened after disconnect; closed");
            }
            None => tracing::info!(node = self.endpoint.node(), "connected"),
        }
        Ok(())
    }

    fn spawn_session(
        self: &Arc<Self>,
        writer: websocket::StompWriter,
        reader: websocket::StompReader,
    ) -> SessionHandle {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let io = SessionIo {
            writer,
            reader,
            outbound: outbound_rx,
        };
        let weak = Arc::downgrade(self);
        let router = Arc::clone(&self.router);
        let heartbeat = self.options.heartbeat_outgoing;
        let task_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            if let SessionEnd::Lost(error) = run_session(io, router, heartbeat, task_cancel).await {
                if let Some(inner) = weak.upgrade() {
                    inner.on_session_lost(generation, &error);
                }
            }
        });

        SessionHandle {
            generation,
            outbound,
            cancel,
            task,
        }
    }

    /// Cancel the live session (if any) and wait briefly for it to close.
    async fn teardown(&self) {
        let Some(handle) = self.session().take() else {
            return;
        };
        handle.cancel.cancel();
        let mut task = handle.task;
        if tokio::time::timeout(TEARDOWN_GRACE, &mut task).await.is_err() {
            tracing::debug!("session task slow to close; aborting");
            task.abort();
        }
    }

    fn on_session_lost(self: &Arc<Self>, generation: u64, error: &vigil_api::Error) {
        {
            let mut session = self.session();
            match session.as_ref() {
                Some(handle) if handle.generation == generation => *session = None,
                _ => return,
            }
        }
        tracing::warn!(error = %error, "session lost");
        self.connection_lost();
    }

    fn connection_lost(self: &Arc<Self>) {
        self.connected.send_replace(false);
        if self.retry().explicitly_closed {
            self.set_state(ConnectionState::Disconnected);
            return;
        }
        self.schedule_reconnect();
    }

    fn schedule_reconnect(self: &Arc<Self>) {
        let mut retry = self.retry();
        retry.attempt = retry.attempt.saturating_add(1);
        let attempt = retry.attempt;

        if let Some(max) = self.reconnect.max_retries {
            if attempt > max {
                drop(retry);
                tracing::error!(max_retries = max, "reconnection limit reached, giving up");
                self.set_state(ConnectionState::Disconnected);
                return;
            }
        }

        if let Some(previous) = retry.timer.take() {
            previous.abort();
        }
        let delay = backoff_delay(attempt, &self.reconnect);
        tracing::warn!(
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "reconnect scheduled"
        );

        let weak: Weak<Self> = Arc::downgrade(self);
        retry.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            {
                let mut retry = inner.retry();
                retry.timer = None;
                if retry.explicitly_closed {
                    return;
                }
            }
            if let Err(e) = inner.establish().await {
                tracing::debug!(error = %e, "reconnect attempt failed");
            }
        }));
        drop(retry);
        self.set_state(ConnectionState::Reconnecting { attempt });
    }
}

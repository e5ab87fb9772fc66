// ── Session facade ──
//
// One `Session` per operator login: the connection manager, the caches it
// feeds, the correlator, and the dual-path action policy, wired together
// once and shared by cloning. No globals.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use vigil_api::{HttpClient, HttpRequest};

use crate::action::{ActionOutcome, ActionPolicy};
use crate::config::SessionConfig;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::error::CoreError;
use crate::model::{Camera, CameraAlert, Digest, Incident, NewsItem, Sensor};
use crate::router::SubscriptionRouter;
use crate::rpc::{RpcCorrelator, RpcRequest};
use crate::store::DomainCaches;
use crate::stream::FeedStream;

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<SessionInner>`.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    caches: Arc<DomainCaches>,
    manager: ConnectionManager,
    actions: ActionPolicy<ConnectionManager, HttpClient>,
}

impl Session {
    /// Wire up a session. Does NOT connect; call [`connect()`](Self::connect).
    pub fn new(config: SessionConfig) -> Result<Self, CoreError> {
        let http = HttpClient::new(config.endpoint(), config.token.clone(), &config.transport())?;
        Ok(Self::with_http(config, http))
    }

    /// Wire up a session around an existing HTTP client.
    pub fn with_http(config: SessionConfig, http: HttpClient) -> Self {
        let caches = Arc::new(DomainCaches::new());
        let correlator = Arc::new(RpcCorrelator::new(config.reply_queue.clone()));
        let router = Arc::new(SubscriptionRouter::new(
            Arc::clone(&caches),
            Arc::clone(&correlator),
            &config.error_queue,
        ));
        let manager = ConnectionManager::new(&config, router, correlator);
        let actions = ActionPolicy::new(manager.clone(), http);

        Self {
            inner: Arc::new(SessionInner {
                config,
                caches,
                manager,
                actions,
            }),
        }
    }

    /// Connect, run `f`, then disconnect.
    ///
    /// A failed connect is not fatal: actions fall back to HTTP.
    pub async fn oneshot<F, Fut, T>(config: SessionConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let session = Session::new(config)?;
        if let Err(e) = session.connect().await {
            tracing::warn!(error = %e, "realtime connect failed, continuing over HTTP");
        }
        let result = f(session.clone()).await;
        session.disconnect().await;
        result
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn caches(&self) -> &Arc<DomainCaches> {
        &self.inner.caches
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.inner.manager
    }

    pub fn http(&self) -> &HttpClient {
        self.inner.actions.http()
    }

    // ── Connection lifecycle ─────────────────────────────────────

    pub async fn connect(&self) -> Result<(), CoreError> {
        self.inner.manager.connect().await
    }

    pub async fn reconnect(&self) -> Result<(), CoreError> {
        self.inner.manager.reconnect().await
    }

    pub async fn disconnect(&self) {
        self.inner.manager.disconnect().await;
    }

    /// Disconnect and forget everything cached for this login.
    pub async fn logout(&self) {
        self.disconnect().await;
        self.inner.caches.clear();
    }

    pub fn is_connected(&self) -> bool {
        self.inner.manager.is_connected()
    }

    pub fn connected(&self) -> watch::Receiver<bool> {
        self.inner.manager.connected()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.manager.state()
    }

    // ── Actions ──────────────────────────────────────────────────

    /// RPC first, HTTP fallback. See [`ActionPolicy::perform`].
    pub async fn perform<T>(
        &self,
        rpc: RpcRequest,
        http: HttpRequest,
        normalize: impl Fn(Value) -> T,
    ) -> Result<ActionOutcome<T>, CoreError> {
        self.inner.actions.perform(rpc, http, normalize).await
    }

    // ── Feeds ────────────────────────────────────────────────────

    pub fn sensors(&self) -> FeedStream<Sensor> {
        self.inner.caches.sensors().subscribe()
    }

    pub fn cameras(&self) -> FeedStream<Camera> {
        self.inner.caches.cameras().subscribe()
    }

    pub fn incidents(&self) -> FeedStream<Incident> {
        self.inner.caches.incidents().subscribe()
    }

    pub fn news(&self) -> FeedStream<NewsItem> {
        self.inner.caches.news().subscribe()
    }

    pub fn digests(&self) -> FeedStream<Digest> {
        self.inner.caches.digests().subscribe()
    }

    pub fn camera_alerts(&self) -> FeedStream<CameraAlert> {
        self.inner.caches.camera_alerts().subscribe()
    }
}

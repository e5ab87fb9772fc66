//! Realtime messaging core between `vigil-api` and console front ends.
//!
//! This crate owns the session lifecycle, the domain model, and the
//! reactive caches of the vigil operator console:
//!
//! - **[`Session`]**: facade wiring everything below together for one
//!   operator login. [`Session::oneshot()`] connects, runs a closure, and
//!   tears down, for single CLI invocations.
//!
//! - **[`ConnectionManager`]**: one STOMP-over-WebSocket session at a time,
//!   exponential backoff on loss, a one-way latch on deliberate teardown,
//!   and `watch` channels for the connected flag and [`ConnectionState`].
//!
//! - **[`SubscriptionRouter`]**: the fixed subscription set, payload
//!   normalization, and shape-sniffing of the aggregated `/topic/all`.
//!
//! - **[`RpcCorrelator`]**: request/response over pub/sub via correlation
//!   ids, per-call timeouts, and content predicates.
//!
//! - **[`DomainCaches`]**: one [`MergeCache`] per record type
//!   (dedup-prepend feeds and upsert registries), observable through
//!   [`FeedStream`].
//!
//! - **[`ActionPolicy`]**: every admin action tries RPC first and falls back
//!   to HTTP.
//!
//! - **[`NodeWatcher`]**: health of every routing node behind the gateway,
//!   from periodic pings and each node's public event stream.

pub mod action;
pub mod config;
pub mod connection;
pub mod error;
pub mod model;
pub mod nodes;
pub mod ops;
pub mod router;
pub mod rpc;
pub mod session;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use action::{ActionOutcome, ActionPolicy, HttpCall, RpcChannel, Via};
pub use config::{SessionConfig, TlsVerification};
pub use connection::{ConnectionManager, ConnectionState, ReconnectConfig, backoff_delay};
pub use error::CoreError;
pub use nodes::{NodeHealth, NodeStatus, NodeWatcher, NodeWatcherConfig};
pub use ops::{
    CameraPolicyUpdate, DetectRequest, IncidentReport, RegisterSensorRequest, SensorPolicyUpdate,
};
pub use router::{Route, Subscription, SubscriptionRouter};
pub use rpc::{Publisher, RpcCorrelator, RpcError, RpcRequest};
pub use session::Session;
pub use store::{DomainCaches, MergeCache, MergePolicy, MergeStats, PolicyBook};
pub use stream::{FeedStream, Snapshot};

pub use model::{
    Camera, CameraAlert, CameraPolicy, Digest, Incident, NewsItem, Record, RecordId, Sensor,
    SensorPolicy,
};

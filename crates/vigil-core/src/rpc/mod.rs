// ── Request/response over pub/sub ──
//
// STOMP only knows one-way sends. A request is a SEND carrying a fresh
// correlation id; the gateway answers on the user reply queue with the
// same id (header or body), or with a payload a caller-supplied predicate
// recognizes. Errors for a request arrive on the user error queue.

mod pending;

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;
use vigil_api::{Frame, Headers};

use crate::error::CoreError;
use crate::model::RecordId;

pub use pending::ReplyMatcher;
use pending::{PendingTable, Reply};

/// Header carrying the correlation id on requests and replies.
pub const CORRELATION_HEADER: &str = "x-correlation-id";
/// Body field carrying the correlation id when the body is an object.
pub const CORRELATION_FIELD: &str = "correlationId";
const ALT_CORRELATION_HEADER: &str = "correlation-id";

/// Timeout when a request does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(6);

/// Why a request produced no reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    #[error("not connected")]
    NotConnected,

    #[error("no reply from {destination} within {timeout_ms} ms")]
    Timeout { destination: String, timeout_ms: u64 },

    #[error("request rejected: {message}")]
    Rejected { message: String },

    #[error("connection closed while waiting for a reply")]
    Disconnected,

    #[error("failed to send request: {0}")]
    Send(String),
}

/// Something that can put a SEND frame on the wire.
pub trait Publisher: Send + Sync {
    fn is_connected(&self) -> bool;

    fn publish(&self, destination: &str, headers: Headers, body: String) -> Result<(), CoreError>;
}

/// One request: destination, JSON body, timeout and optional reply predicate.
pub struct RpcRequest {
    pub destination: String,
    pub body: Value,
    pub timeout: Duration,
    matcher: Option<ReplyMatcher>,
}

impl fmt::Debug for RpcRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcRequest")
            .field("destination", &self.destination)
            .field("body", &self.body)
            .field("timeout", &self.timeout)
            .field("matcher", &self.matcher.is_some())
            .finish()
    }
}

impl RpcRequest {
    pub fn new(destination: impl Into<String>, body: Value) -> Self {
        Self {
            destination: destination.into(),
            body,
            timeout: DEFAULT_TIMEOUT,
            matcher: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Also accept a reply without our correlation id if `matcher` says so.
    pub fn matching(
        mut self,
        matcher: impl Fn(&Value, &Headers) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.matcher = Some(Box::new(matcher));
        self
    }

    /// Accept a reply whose first non-null field among `fields` equals `id`.
    pub fn matching_id(self, fields: &'static [&'static str], id: RecordId) -> Self {
        self.matching(move |payload, _| {
            fields
                .iter()
                .find_map(|f| payload.get(*f).filter(|v| !v.is_null()))
                .is_some_and(|v| id.matches(v))
        })
    }
}

/// Correlates replies on the reply queues with outstanding requests.
pub struct RpcCorrelator {
    pending: PendingTable,
    reply_to: String,
}

impl RpcCorrelator {
    /// `reply_to` is advertised in the `reply-to` header of every request.
    pub fn new(reply_to: impl Into<String>) -> Self {
        Self {
            pending: PendingTable::new(),
            reply_to: reply_to.into(),
        }
    }

    pub fn reply_to(&self) -> &str {
        &self.reply_to
    }

    /// Number of requests awaiting a reply.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Send `request` through `publisher` and wait for its reply.
    ///
    /// Fails fast with `NotConnected` without registering anything. If the
    /// returned future is dropped early the registration is removed.
    pub async fn request<P: Publisher + ?Sized>(
        &self,
        publisher: &P,
        request: RpcRequest,
    ) -> Result<Value, RpcError> {
        if !publisher.is_connected() {
            return Err(RpcError::NotConnected);
        }

        let RpcRequest {
            destination,
            mut body,
            timeout,
            matcher,
        } = request;

        let id = Uuid::new_v4().to_string();
        if let Value::Object(map) = &mut body {
            map.insert(CORRELATION_FIELD.into(), Value::String(id.clone()));
        }

        let Some(mut rx) = self.pending.register(id.clone(), destination.clone(), matcher) else {
            return Err(RpcError::Send("correlation id already pending".into()));
        };
        let _registration = Registration {
            table: &self.pending,
            id: &id,
        };

        let headers = Headers::new()
            .with(CORRELATION_HEADER, id.as_str())
            .with("reply-to", self.reply_to.as_str())
            .with("content-type", "application/json");
        publisher
            .publish(&destination, headers, body.to_string())
            .map_err(|e| match e {
                CoreError::NotConnected => RpcError::NotConnected,
                other => RpcError::Send(other.to_string()),
            })?;
        tracing::debug!(destination = %destination, correlation_id = %id, "rpc request sent");

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(RpcError::Disconnected),
            Err(_) => {
                if self.pending.remove(&id) {
                    tracing::debug!(destination = %destination, correlation_id = %id, "rpc request timed out");
                    Err(RpcError::Timeout {
                        destination,
                        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    })
                } else {
                    // Completed concurrently with the timer; the reply is already in the channel.
                    rx.try_recv().unwrap_or(Err(RpcError::Disconnected))
                }
            }
        }
    }

    /// Handle a frame from the reply queue. `true` if it completed a request.
    pub fn resolve(&self, frame: &Frame) -> bool {
        self.settle(frame, "reply", |payload| Ok(payload.clone()))
    }

    /// Handle a frame from the error queue. `true` if it failed a request.
    pub fn reject(&self, frame: &Frame) -> bool {
        self.settle(frame, "error", |payload| {
            Err(RpcError::Rejected {
                message: rejection_message(payload, &frame.body),
            })
        })
    }

    /// Fail every outstanding request with `Disconnected`.
    pub fn drain(&self) -> usize {
        let count = self.pending.drain(|| RpcError::Disconnected);
        if count > 0 {
            tracing::debug!(count, "pending requests drained");
        }
        count
    }

    fn settle(&self, frame: &Frame, what: &str, outcome: impl Fn(&Value) -> Reply) -> bool {
        let payload = parse_body(&frame.body);

        if let Some(id) = correlation_id(frame, &payload) {
            if self.pending.complete(&id, outcome(&payload)) {
                tracing::debug!(correlation_id = %id, kind = what, "rpc settled by id");
                return true;
            }
        }

        if self
            .pending
            .complete_matching(&payload, &frame.headers, || outcome(&payload))
            .is_some()
        {
            return true;
        }

        tracing::debug!(kind = what, "unmatched rpc {what} dropped");
        false
    }
}

/// Removes a registration when the waiting future goes away.
struct Registration<'a> {
    table: &'a PendingTable,
    id: &'a str,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if self.table.remove(self.id) {
            tracing::trace!(correlation_id = %self.id, "abandoned rpc request removed");
        }
    }
}

fn parse_body(body: &str) -> Value {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_owned()))
}

fn correlation_id(frame: &Frame, payload: &Value) -> Option<String> {
    frame
        .get(CORRELATION_HEADER)
        .or_else(|| frame.get(ALT_CORRELATION_HEADER))
        .map(str::to_owned)
        .or_else(|| {
            payload
                .get(CORRELATION_FIELD)
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
}

fn rejection_message(payload: &Value, raw: &str) -> String {
    ["message", "error"]
        .iter()
        .find_map(|f| payload.get(*f).and_then(Value::as_str))
        .map_or_else(|| raw.trim().to_owned(), str::to_owned)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use serde_json::json;
    use vigil_api::Command;

    use super::*;

    /// Records what would have gone on the wire.
    #[derive(Default)]
    struct FakeWire {
        offline: AtomicBool,
        sent: Mutex<Vec<(String, Headers, String)>>,
    }

    impl FakeWire {
        fn last_id(&self) -> String {
            let sent = self.sent.lock().unwrap();
            sent.last().unwrap().1.get(CORRELATION_HEADER).unwrap().to_owned()
        }
    }

    impl Publisher for FakeWire {
        fn is_connected(&self) -> bool {
            !self.offline.load(Ordering::SeqCst)
        }

        fn publish(&self, destination: &str, headers: Headers, body: String) -> Result<(), CoreError> {
            self.sent
                .lock()
                .unwrap()
                .push((destination.to_owned(), headers, body));
            Ok(())
        }
    }

    fn reply(headers: &[(&str, &str)], body: &Value) -> Frame {
        let mut frame = Frame::new(Command::Message).with_body(body.to_string());
        for (k, v) in headers {
            frame = frame.header(*k, *v);
        }
        frame
    }

    async fn wait_for_send(wire: &FakeWire, count: usize) {
        while wire.sent.lock().unwrap().len() < count {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn not_connected_fails_without_registering() {
        let wire = FakeWire::default();
        wire.offline.store(true, Ordering::SeqCst);
        let rpc = RpcCorrelator::new("/user/queue/reply");

        let err = rpc
            .request(&wire, RpcRequest::new("/app/admin/x", json!({})))
            .await
            .unwrap_err();
        assert_eq!(err, RpcError::NotConnected);
        assert_eq!(rpc.pending(), 0);
        assert!(wire.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn request_carries_correlation_in_header_and_body() {
        let wire = Arc::new(FakeWire::default());
        let rpc = Arc::new(RpcCorrelator::new("/user/queue/reply"));

        let task = {
            let (wire, rpc) = (Arc::clone(&wire), Arc::clone(&rpc));
            tokio::spawn(async move {
                rpc.request(&*wire, RpcRequest::new("/app/admin/ping", json!({"a": 1})))
                    .await
            })
        };
        wait_for_send(&wire, 1).await;

        let (destination, headers, body) = wire.sent.lock().unwrap()[0].clone();
        let id = headers.get(CORRELATION_HEADER).unwrap().to_owned();
        assert_eq!(destination, "/app/admin/ping");
        assert_eq!(headers.get("reply-to"), Some("/user/queue/reply"));
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["correlationId"], id.as_str());
        assert_eq!(body["a"], 1);

        assert!(rpc.resolve(&reply(&[(CORRELATION_HEADER, &id)], &json!({"ok": true}))));
        assert_eq!(task.await.unwrap().unwrap(), json!({"ok": true}));
        assert_eq!(rpc.pending(), 0);
    }

    #[tokio::test]
    async fn body_correlation_id_resolves() {
        let wire = Arc::new(FakeWire::default());
        let rpc = Arc::new(RpcCorrelator::new("/user/queue/reply"));
        let task = {
            let (wire, rpc) = (Arc::clone(&wire), Arc::clone(&rpc));
            tokio::spawn(async move { rpc.request(&*wire, RpcRequest::new("/app/x", json!({}))).await })
        };
        wait_for_send(&wire, 1).await;
        let id = wire.last_id();

        assert!(rpc.resolve(&reply(&[], &json!({"correlationId": id, "v": 2}))));
        assert_eq!(task.await.unwrap().unwrap()["v"], 2);
    }

    #[tokio::test]
    async fn predicate_resolves_reply_without_id() {
        let wire = Arc::new(FakeWire::default());
        let rpc = Arc::new(RpcCorrelator::new("/user/queue/reply"));
        let task = {
            let (wire, rpc) = (Arc::clone(&wire), Arc::clone(&rpc));
            tokio::spawn(async move {
                let req = RpcRequest::new("/app/admin/sensors/policy/get", json!({"sensorId": 7}))
                    .matching_id(&["sensorId", "id"], RecordId::Number(7));
                rpc.request(&*wire, req).await
            })
        };
        wait_for_send(&wire, 1).await;

        assert!(!rpc.resolve(&reply(&[], &json!({"sensorId": 8}))));
        assert!(rpc.resolve(&reply(&[], &json!({"sensorId": 7, "mode": "AUTO"}))));
        assert_eq!(task.await.unwrap().unwrap()["mode"], "AUTO");
    }

    #[tokio::test]
    async fn id_match_wins_and_later_predicate_match_is_a_no_op() {
        let wire = Arc::new(FakeWire::default());
        let rpc = Arc::new(RpcCorrelator::new("/user/queue/reply"));
        let task = {
            let (wire, rpc) = (Arc::clone(&wire), Arc::clone(&rpc));
            tokio::spawn(async move {
                let req = RpcRequest::new("/app/admin/camera-policy/get", json!({"cameraId": "c1"}))
                    .matching_id(&["cameraId", "id"], RecordId::from("c1"));
                rpc.request(&*wire, req).await
            })
        };
        wait_for_send(&wire, 1).await;
        let id = wire.last_id();

        assert!(rpc.resolve(&reply(&[(CORRELATION_HEADER, &id)], &json!({"cameraId": "c1", "n": 1}))));
        assert!(!rpc.resolve(&reply(&[], &json!({"cameraId": "c1", "n": 2}))));
        assert_eq!(task.await.unwrap().unwrap(), json!({"cameraId": "c1", "n": 1}));
        assert_eq!(rpc.pending(), 0);
    }

    #[tokio::test]
    async fn error_queue_rejects() {
        let wire = Arc::new(FakeWire::default());
        let rpc = Arc::new(RpcCorrelator::new("/user/queue/reply"));
        let task = {
            let (wire, rpc) = (Arc::clone(&wire), Arc::clone(&rpc));
            tokio::spawn(async move { rpc.request(&*wire, RpcRequest::new("/app/x", json!({}))).await })
        };
        wait_for_send(&wire, 1).await;
        let id = wire.last_id();

        assert!(rpc.reject(&reply(&[(ALT_CORRELATION_HEADER, &id)], &json!({"message": "denied"}))));
        assert_eq!(
            task.await.unwrap().unwrap_err(),
            RpcError::Rejected {
                message: "denied".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_removes_the_entry_and_late_reply_is_ignored() {
        let wire = FakeWire::default();
        let rpc = RpcCorrelator::new("/user/queue/reply");

        let err = rpc
            .request(
                &wire,
                RpcRequest::new("/app/slow", json!({})).timeout(Duration::from_millis(4000)),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RpcError::Timeout {
                destination: "/app/slow".into(),
                timeout_ms: 4000
            }
        );
        assert_eq!(rpc.pending(), 0);

        let id = wire.last_id();
        assert!(!rpc.resolve(&reply(&[(CORRELATION_HEADER, &id)], &json!({}))));
    }

    #[tokio::test]
    async fn drain_rejects_outstanding_requests() {
        let wire = Arc::new(FakeWire::default());
        let rpc = Arc::new(RpcCorrelator::new("/user/queue/reply"));
        let spawn = |dest: &'static str| {
            let (wire, rpc) = (Arc::clone(&wire), Arc::clone(&rpc));
            tokio::spawn(async move {
                rpc.request(&*wire, RpcRequest::new(dest, json!({})).timeout(Duration::from_secs(60)))
                    .await
            })
        };
        let a = spawn("/app/a");
        let b = spawn("/app/b");
        wait_for_send(&wire, 2).await;

        assert_eq!(rpc.drain(), 2);
        assert_eq!(a.await.unwrap().unwrap_err(), RpcError::Disconnected);
        assert_eq!(b.await.unwrap().unwrap_err(), RpcError::Disconnected);
    }

    #[tokio::test]
    async fn dropped_caller_leaves_no_entry() {
        let wire = Arc::new(FakeWire::default());
        let rpc = Arc::new(RpcCorrelator::new("/user/queue/reply"));
        let task = {
            let (wire, rpc) = (Arc::clone(&wire), Arc::clone(&rpc));
            tokio::spawn(async move { rpc.request(&*wire, RpcRequest::new("/app/x", json!({}))).await })
        };
        wait_for_send(&wire, 1).await;
        assert_eq!(rpc.pending(), 1);

        task.abort();
        let _ = task.await;
        assert_eq!(rpc.pending(), 0);
    }

    #[test]
    fn rejection_message_falls_back_to_raw_body() {
        assert_eq!(rejection_message(&json!({"error": "E1"}), ""), "E1");
        assert_eq!(rejection_message(&Value::String("boom".into()), " boom "), "boom");
    }
}

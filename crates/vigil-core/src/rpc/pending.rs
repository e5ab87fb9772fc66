//! Table of requests awaiting a reply.
//!
//! Every entry leaves the table exactly once: resolved by id, resolved by
//! predicate, timed out, or drained on teardown. Whoever removes the entry
//! owns the completion; everyone else sees `false` and does nothing.

use std::sync::{Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::oneshot;
use vigil_api::Headers;

use super::RpcError;

/// Outcome delivered to the waiting caller.
pub(crate) type Reply = Result<Value, RpcError>;

/// Content predicate for replies that carry no correlation id.
pub type ReplyMatcher = Box<dyn Fn(&Value, &Headers) -> bool + Send + Sync>;

struct PendingRequest {
    tx: oneshot::Sender<Reply>,
    destination: String,
    matcher: Option<ReplyMatcher>,
}

/// Pending requests in registration order, keyed by correlation id.
#[derive(Default)]
pub(crate) struct PendingTable {
    entries: Mutex<IndexMap<String, PendingRequest>>,
}

impl PendingTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register `id`; the receiver completes when the entry leaves the table.
    ///
    /// Returns `None` if `id` is already pending.
    pub(crate) fn register(
        &self,
        id: String,
        destination: String,
        matcher: Option<ReplyMatcher>,
    ) -> Option<oneshot::Receiver<Reply>> {
        let mut entries = self.lock();
        if entries.contains_key(&id) {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        entries.insert(
            id,
            PendingRequest {
                tx,
                destination,
                matcher,
            },
        );
        Some(rx)
    }

    /// Complete the request with correlation id `id`.
    pub(crate) fn complete(&self, id: &str, reply: Reply) -> bool {
        let mut entries = self.lock();
        let Some(pending) = entries.shift_remove(id) else {
            return false;
        };
        // Send while still holding the lock so a racing timeout that finds
        // the entry gone can rely on the value being in the channel.
        let _ = pending.tx.send(reply);
        true
    }

    /// Complete the oldest request whose predicate accepts this reply.
    ///
    /// Returns the correlation id that was completed.
    pub(crate) fn complete_matching(
        &self,
        payload: &Value,
        headers: &Headers,
        reply: impl FnOnce() -> Reply,
    ) -> Option<String> {
        let mut entries = self.lock();
        let id = entries
            .iter()
            .find(|(_, p)| p.matcher.as_ref().is_some_and(|m| m(payload, headers)))
            .map(|(id, _)| id.clone())?;
        let pending = entries.shift_remove(&id)?;
        tracing::debug!(destination = %pending.destination, correlation_id = %id, "reply matched by content");
        let _ = pending.tx.send(reply());
        Some(id)
    }

    /// Remove without completing. `true` if the entry was still pending.
    pub(crate) fn remove(&self, id: &str) -> bool {
        self.lock().shift_remove(id).is_some()
    }

    /// Fail every pending request. Returns how many were failed.
    pub(crate) fn drain(&self, error: impl Fn() -> RpcError) -> usize {
        let drained: Vec<PendingRequest> = self.lock().drain(..).map(|(_, p)| p).collect();
        let count = drained.len();
        for pending in drained {
            let _ = pending.tx.send(Err(error()));
        }
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<String, PendingRequest>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn by_field(field: &'static str, expected: i64) -> ReplyMatcher {
        Box::new(move |payload, _| payload.get(field).and_then(Value::as_i64) == Some(expected))
    }

    #[tokio::test]
    async fn complete_is_exactly_once() {
        let table = PendingTable::new();
        let rx = table.register("a".into(), "/app/x".into(), None).unwrap();

        assert!(table.complete("a", Ok(json!(1))));
        assert!(!table.complete("a", Ok(json!(2))));
        assert!(!table.remove("a"));
        assert_eq!(table.drain(|| RpcError::Disconnected), 0);

        assert_eq!(rx.await.unwrap().unwrap(), json!(1));
    }

    #[test]
    fn duplicate_ids_are_refused() {
        let table = PendingTable::new();
        let _rx = table.register("a".into(), "/app/x".into(), None).unwrap();
        assert!(table.register("a".into(), "/app/x".into(), None).is_none());
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn predicate_matches_oldest_first() {
        let table = PendingTable::new();
        let first = table
            .register("first".into(), "/app/p".into(), Some(by_field("sensorId", 3)))
            .unwrap();
        let second = table
            .register("second".into(), "/app/p".into(), Some(by_field("sensorId", 3)))
            .unwrap();
        let _other = table
            .register("other".into(), "/app/p".into(), None)
            .unwrap();

        let payload = json!({"sensorId": 3});
        let hit = table.complete_matching(&payload, &Headers::new(), || Ok(payload.clone()));
        assert_eq!(hit.as_deref(), Some("first"));
        assert_eq!(first.await.unwrap().unwrap(), payload);
        assert_eq!(table.len(), 2);

        let miss = table.complete_matching(&json!({"sensorId": 4}), &Headers::new(), || {
            Ok(Value::Null)
        });
        assert!(miss.is_none());
        drop(second);
    }

    #[tokio::test]
    async fn drain_fails_everything() {
        let table = PendingTable::new();
        let a = table.register("a".into(), "/app/x".into(), None).unwrap();
        let b = table.register("b".into(), "/app/y".into(), None).unwrap();

        assert_eq!(table.drain(|| RpcError::Disconnected), 2);
        assert!(matches!(a.await.unwrap(), Err(RpcError::Disconnected)));
        assert!(matches!(b.await.unwrap(), Err(RpcError::Disconnected)));
        assert_eq!(table.len(), 0);
    }
}

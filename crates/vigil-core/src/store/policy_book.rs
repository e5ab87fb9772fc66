// ── Policy books ──
//
// Last known policy per entity, filled from RPC replies, HTTP responses
// and policy broadcasts.

use std::sync::Arc;

use dashmap::DashMap;

/// Concurrent map from entity key to its latest normalized policy.
pub struct PolicyBook<P> {
    by_key: DashMap<String, Arc<P>>,
}

impl<P> Default for PolicyBook<P> {
    fn default() -> Self {
        Self {
            by_key: DashMap::new(),
        }
    }
}

impl<P> PolicyBook<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `policy`, returning the one it replaced.
    pub fn insert(&self, key: impl Into<String>, policy: P) -> Option<Arc<P>> {
        self.by_key.insert(key.into(), Arc::new(policy))
    }

    pub fn get(&self, key: &str) -> Option<Arc<P>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    pub fn remove(&self, key: &str) -> Option<Arc<P>> {
        self.by_key.remove(key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn clear(&self) {
        self.by_key.clear();
    }
}

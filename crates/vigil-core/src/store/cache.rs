// ── Merge caches ──
//
// One cache per domain. Feeds (news, incidents, digests, camera alerts)
// are newest-first and bounded; registries (sensors, cameras) upsert in
// place. Both publish a snapshot through a `watch` channel after every
// mutation so views can re-render without polling.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use tokio::sync::watch;

use crate::model::{Record, shallow_merge};
use crate::stream::{FeedStream, Snapshot};

/// How a cache folds incoming items into what it already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Unseen keys are prepended, seen keys dropped, oldest truncated.
    DedupPrepend { capacity: usize },
    /// New keys appended, existing keys shallow-merged. Unbounded.
    Upsert,
}

/// Outcome of one `merge` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MergeStats {
    /// Items added under a new key.
    pub added: usize,
    /// Items merged into an existing record (upsert only).
    pub updated: usize,
    /// Items dropped as duplicates or for lacking an identity.
    pub dropped: usize,
}

enum Slots<T> {
    Feed {
        items: Vec<(String, Arc<T>)>,
        seen: HashSet<String>,
        capacity: usize,
    },
    Registry {
        items: IndexMap<String, Arc<T>>,
    },
}

impl<T> Slots<T> {
    fn reset(&mut self) {
        match self {
            Self::Feed { items, seen, .. } => {
                items.clear();
                seen.clear();
            }
            Self::Registry { items } => items.clear(),
        }
    }

    fn values(&self) -> Vec<Arc<T>> {
        match self {
            Self::Feed { items, .. } => items.iter().map(|(_, v)| Arc::clone(v)).collect(),
            Self::Registry { items } => items.values().map(Arc::clone).collect(),
        }
    }
}

fn fold<T: Record>(slots: &mut Slots<T>, batch: impl IntoIterator<Item = T>) -> MergeStats {
    let mut stats = MergeStats::default();
    match slots {
        Slots::Feed {
            items,
            seen,
            capacity,
        } => {
            let mut fresh = Vec::new();
            for item in batch {
                let Some(key) = item.identity() else {
                    tracing::debug!(kind = T::KIND, "dropping item without identity");
                    stats.dropped += 1;
                    continue;
                };
                if !seen.insert(key.clone()) {
                    stats.dropped += 1;
                    continue;
                }
                fresh.push((key, Arc::new(item)));
            }
            stats.added = fresh.len();
            if !fresh.is_empty() {
                fresh.append(items);
                fresh.truncate(*capacity);
                *items = fresh;
            }
        }
        Slots::Registry { items } => {
            for item in batch {
                let Some(key) = item.identity() else {
                    tracing::debug!(kind = T::KIND, "dropping item without identity");
                    stats.dropped += 1;
                    continue;
                };
                if let Some(existing) = items.get_mut(&key) {
                    *existing = Arc::new(shallow_merge(existing.as_ref(), item));
                    stats.updated += 1;
                } else {
                    items.insert(key, Arc::new(item));
                    stats.added += 1;
                }
            }
        }
    }
    if stats.dropped > 0 {
        tracing::trace!(kind = T::KIND, dropped = stats.dropped, "duplicates dropped");
    }
    stats
}

/// A keyed, observable collection for one record type.
pub struct MergeCache<T: Record> {
    policy: MergePolicy,
    slots: Mutex<Slots<T>>,
    snapshot: watch::Sender<Snapshot<T>>,
}

impl<T: Record> MergeCache<T> {
    pub fn new(policy: MergePolicy) -> Self {
        let slots = match policy {
            MergePolicy::DedupPrepend { capacity } => Slots::Feed {
                items: Vec::new(),
                seen: HashSet::new(),
                capacity,
            },
            MergePolicy::Upsert => Slots::Registry {
                items: IndexMap::new(),
            },
        };
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            policy,
            slots: Mutex::new(slots),
            snapshot,
        }
    }

    pub fn dedup_prepend(capacity: usize) -> Self {
        Self::new(MergePolicy::DedupPrepend { capacity })
    }

    pub fn upsert() -> Self {
        Self::new(MergePolicy::Upsert)
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Fold a batch into the cache. Publishes one snapshot if anything changed.
    pub fn merge(&self, batch: impl IntoIterator<Item = T>) -> MergeStats {
        let mut slots = self.lock();
        let stats = fold(&mut slots, batch);
        if stats.added + stats.updated > 0 {
            self.publish(&slots);
        }
        stats
    }

    /// Rebuild the cache from `batch` alone, publishing a single snapshot.
    ///
    /// Items missing from `batch` are gone afterwards, and feeds forget
    /// their seen keys first.
    pub fn replace(&self, batch: impl IntoIterator<Item = T>) -> MergeStats {
        let mut slots = self.lock();
        slots.reset();
        let stats = fold(&mut slots, batch);
        self.publish(&slots);
        stats
    }

    /// Modify the record stored under `key` in place. Returns `false` if absent.
    pub fn update(&self, key: &str, f: impl FnOnce(&mut T)) -> bool {
        let mut slots = self.lock();
        let slot = match &mut *slots {
            Slots::Feed { items, .. } => items.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v),
            Slots::Registry { items } => items.get_mut(key),
        };
        let Some(slot) = slot else {
            return false;
        };
        f(Arc::make_mut(slot));
        self.publish(&slots);
        true
    }

    /// Drop every item and forget every seen key.
    pub fn clear(&self) {
        let mut slots = self.lock();
        slots.reset();
        self.publish(&slots);
    }

    /// Current items, newest-first for feeds, insertion order for registries.
    pub fn items(&self) -> Snapshot<T> {
        self.snapshot.borrow().clone()
    }

    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        match &*self.lock() {
            Slots::Feed { items, .. } => items
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| Arc::clone(v)),
            Slots::Registry { items } => items.get(key).map(Arc::clone),
        }
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    pub fn subscribe(&self) -> FeedStream<T> {
        FeedStream::new(self.snapshot.subscribe())
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, Slots<T>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, slots: &Slots<T>) {
        let values = slots.values();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}

// ── Generic reactive entity collection ──
//
// Concurrent storage with O(1) lookups by id and push-based change
// notification via `watch` channels.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

/// A concurrent, reactive collection for a single entity type.
///
/// Every mutation bumps a version counter and rebuilds the snapshot that
/// subscribers receive. Snapshots are sorted by id so consumers iterate
/// in a stable order.
pub(crate) struct EntityCollection<K, T>
where
    K: Copy + Eq + Hash + Ord + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    by_id: DashMap<K, Arc<T>>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on mutation.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<K, T> EntityCollection<K, T>
where
    K: Copy + Eq + Hash + Ord + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_id: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Insert or update an entity. Returns `true` if the id was new.
    pub(crate) fn upsert(&self, id: K, entity: T) -> bool {
        let is_new = self.by_id.insert(id, Arc::new(entity)).is_none();
        self.rebuild_snapshot();
        self.bump_version();
        is_new
    }

    /// Remove an entity by id. Returns the removed entity if it existed.
    pub(crate) fn remove(&self, id: &K) -> Option<Arc<T>> {
        let removed = self.by_id.remove(id).map(|(_, v)| v);
        if removed.is_some() {
            self.rebuild_snapshot();
            self.bump_version();
        }
        removed
    }

    /// Replace the whole contents in one step (one snapshot rebuild,
    /// one version bump).
    pub(crate) fn replace_all(&self, entities: impl IntoIterator<Item = (K, T)>) {
        self.by_id.clear();
        for (id, entity) in entities {
            self.by_id.insert(id, Arc::new(entity));
        }
        self.rebuild_snapshot();
        self.bump_version();
    }

    pub(crate) fn get(&self, id: &K) -> Option<Arc<T>> {
        self.by_id.get(id).map(|r| Arc::clone(r.value()))
    }

    pub(crate) fn contains(&self, id: &K) -> bool {
        self.by_id.contains_key(id)
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    #[allow(dead_code)]
    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    #[allow(dead_code)]
    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Largest id currently stored.
    pub(crate) fn max_id(&self) -> Option<K> {
        self.by_id.iter().map(|r| *r.key()).max()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn rebuild_snapshot(&self) {
        let mut entries: Vec<(K, Arc<T>)> = self
            .by_id
            .iter()
            .map(|r| (*r.key(), Arc::clone(r.value())))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        let values = entries.into_iter().map(|(_, v)| v).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

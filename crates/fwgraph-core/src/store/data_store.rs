// ── Central policy data store ──
//
// Thread-safe storage for segments, rules and firewalls. Every mutation
// bumps a store-wide version published on a `watch` channel; that
// version is the invalidation signal the engine keys its graph cache on.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::collection::EntityCollection;
use crate::model::{Firewall, FirewallId, Rule, RuleId, Segment, SegmentId};

/// Central store for the policy model.
///
/// Reads are lock-free; writes use `DashMap`'s per-shard locks, and the
/// validated write path (`store::mutate`) additionally serializes on a
/// store-wide mutex so checks and inserts are atomic.
pub struct DataStore {
    pub(crate) segments: EntityCollection<SegmentId, Segment>,
    pub(crate) rules: EntityCollection<RuleId, Rule>,
    pub(crate) firewalls: EntityCollection<FirewallId, Firewall>,
    pub(crate) changes: watch::Sender<u64>,
    pub(crate) last_full_refresh: watch::Sender<Option<DateTime<Utc>>>,
    write_lock: Mutex<()>,
}

impl DataStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0u64);
        let (last_full_refresh, _) = watch::channel(None);

        Self {
            segments: EntityCollection::new(),
            rules: EntityCollection::new(),
            firewalls: EntityCollection::new(),
            changes,
            last_full_refresh,
            write_lock: Mutex::new(()),
        }
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    /// All segments, sorted by id.
    pub fn segments_snapshot(&self) -> Arc<Vec<Arc<Segment>>> {
        self.segments.snapshot()
    }

    /// All rules, sorted by id.
    pub fn rules_snapshot(&self) -> Arc<Vec<Arc<Rule>>> {
        self.rules.snapshot()
    }

    /// All firewalls, sorted by id.
    pub fn firewalls_snapshot(&self) -> Arc<Vec<Arc<Firewall>>> {
        self.firewalls.snapshot()
    }

    // ── Single-entity lookups ────────────────────────────────────────

    pub fn segment_by_id(&self, id: SegmentId) -> Option<Arc<Segment>> {
        self.segments.get(&id)
    }

    pub fn rule_by_id(&self, id: RuleId) -> Option<Arc<Rule>> {
        self.rules.get(&id)
    }

    pub fn firewall_by_id(&self, id: FirewallId) -> Option<Arc<Firewall>> {
        self.firewalls.get(&id)
    }

    /// Case-insensitive exact name lookup.
    pub fn segment_by_name(&self, name: &str) -> Option<Arc<Segment>> {
        self.segments
            .snapshot()
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name.trim()))
            .cloned()
    }

    // ── Count accessors ──────────────────────────────────────────────

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn firewall_count(&self) -> usize {
        self.firewalls.len()
    }

    // ── Change tracking ──────────────────────────────────────────────

    /// Store-wide version; increases on every mutation.
    pub fn version(&self) -> u64 {
        *self.changes.borrow()
    }

    /// Subscribe to the store version. Fires after every mutation.
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub(crate) fn mark_changed(&self) {
        self.changes.send_modify(|v| *v += 1);
    }

    pub(crate) fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ── Metadata ─────────────────────────────────────────────────────

    pub fn last_full_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_full_refresh.borrow()
    }

    /// How long ago the last full refresh occurred, or `None` if never refreshed.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.last_full_refresh().map(|t| Utc::now() - t)
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

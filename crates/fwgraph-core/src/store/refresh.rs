// ── Full refresh application logic ──
//
// Applies a complete policy snapshot (from the API or a snapshot file)
// into the DataStore, and exports the store back into a snapshot for
// file write-back.

use chrono::Utc;

use super::DataStore;
use crate::source::PolicySnapshot;

impl DataStore {
    /// Replace the store contents with `snapshot`.
    ///
    /// Always counts as a change, even if the data is identical: a refresh
    /// follows an invalidation, and downstream caches must rebuild.
    pub(crate) fn apply_snapshot(&self, snapshot: PolicySnapshot) {
        let _guard = self.lock_writes();

        self.segments
            .replace_all(snapshot.segments.into_iter().map(|s| (s.id, s)));
        self.rules
            .replace_all(snapshot.rules.into_iter().map(|r| (r.id, r)));
        self.firewalls
            .replace_all(snapshot.firewalls.into_iter().map(|f| (f.id, f)));

        let _ = self.last_full_refresh.send(Some(Utc::now()));
        self.mark_changed();
    }

    /// Export the current contents, sorted by id.
    pub fn to_snapshot(&self) -> PolicySnapshot {
        PolicySnapshot {
            segments: self
                .segments_snapshot()
                .iter()
                .map(|s| (**s).clone())
                .collect(),
            firewalls: self
                .firewalls_snapshot()
                .iter()
                .map(|f| (**f).clone())
                .collect(),
            rules: self
                .rules_snapshot()
                .iter()
                .map(|r| (**r).clone())
                .collect(),
        }
    }
}

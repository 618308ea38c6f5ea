// ── Domain model ──
//
// Canonical representation of the policy data. The API crate's wire
// types are converted into these in `convert`; snapshot files
// deserialize into them directly.

pub mod entity_id;
pub mod firewall;
pub mod rule;
pub mod segment;

// ── Re-exports ──────────────────────────────────────────────────────

pub use entity_id::{FirewallId, RuleId, SegmentId};
pub use firewall::Firewall;
pub use rule::{Protocol, Rule, RuleAction};
pub use segment::{Segment, ZoneType};

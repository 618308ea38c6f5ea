// ── Network segment domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use super::entity_id::SegmentId;

/// Security zone a segment belongs to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(try_from = "String")]
#[strum(ascii_case_insensitive)]
pub enum ZoneType {
    #[serde(rename = "DMZ")]
    #[strum(serialize = "DMZ")]
    Dmz,
    Internal,
    External,
    Management,
}

impl TryFrom<String> for ZoneType {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.trim().parse()
    }
}

/// A named network address range (e.g. "DMZ Web", `10.0.5.0/24`).
///
/// Segments are the nodes of the policy graph. `color` is a display hint
/// carried through for the topology view; the engine ignores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub name: String,
    /// CIDR notation, validated on write.
    pub ip_range: String,
    pub zone_type: ZoneType,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

pub(crate) fn default_color() -> String {
    "#95A5A6".into()
}

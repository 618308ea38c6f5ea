//! Wire types for the REST backend.
//!
//! All types match the JSON bodies of `/api/network-segments`,
//! `/api/firewall-rules` and `/api/firewalls`. Field names are snake_case on
//! the wire, so no renaming is needed. Enumerated fields (zone type,
//! protocol, action) stay as strings here; `fwgraph-core` parses them.

use serde::{Deserialize, Serialize};

// ── Pagination ───────────────────────────────────────────────────────

/// Largest `limit` the backend accepts on list endpoints.
pub const MAX_PAGE_LIMIT: u32 = 500;

// ── Network segments ─────────────────────────────────────────────────

/// Network segment: from `GET /api/network-segments/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentResponse {
    pub id: u64,
    pub name: String,
    /// CIDR notation.
    pub ip_range: String,
    /// One of: `DMZ`, `Internal`, `External`, `Management`.
    pub zone_type: String,
    /// Hex colour (`#RRGGBB`).
    pub color: String,
    #[serde(default)]
    pub description: Option<String>,
    /// ISO 8601 date-time.
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Create / full-update body for a network segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentCreateUpdate {
    pub name: String,
    pub ip_range: String,
    pub zone_type: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Result of `POST /api/network-segments/import/csv`.
///
/// Rows the backend rejects are listed in `errors` and skipped. A failed
/// commit reports `success: false` with `message` and `created: 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvImportResponse {
    pub success: bool,
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
}

// ── Firewalls ────────────────────────────────────────────────────────

/// Firewall (enforcement point): from `GET /api/firewalls/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirewallResponse {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub management_ip: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

// ── Firewall rules ───────────────────────────────────────────────────

/// Firewall rule: from `GET /api/firewall-rules/`.
///
/// List responses are enriched with the endpoint segments' names and
/// ranges; create/update responses omit them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResponse {
    pub id: u64,
    pub firewall_id: u64,
    pub rule_name: String,
    pub source_segment_id: u64,
    pub destination_segment_id: u64,
    /// One of: `TCP`, `UDP`, `ICMP`, `ANY`.
    pub protocol: String,
    #[serde(default)]
    pub port_range: Option<String>,
    /// One of: `ALLOW`, `DENY`.
    pub action: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub source_segment_name: Option<String>,
    #[serde(default)]
    pub source_segment_ip: Option<String>,
    #[serde(default)]
    pub destination_segment_name: Option<String>,
    #[serde(default)]
    pub destination_segment_ip: Option<String>,
}

/// Create / full-update body for a firewall rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCreateUpdate {
    pub firewall_id: u64,
    pub rule_name: String,
    pub source_segment_id: u64,
    pub destination_segment_id: u64,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_range: Option<String>,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body for `POST /api/firewall-rules/bulk-delete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<u64>,
}

/// Response of `POST /api/firewall-rules/bulk-delete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDeleteResponse {
    pub success: bool,
    pub deleted: u64,
}

// ── Rule list filters ────────────────────────────────────────────────

/// Server-side filters accepted by `GET /api/firewall-rules/`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleListFilter {
    pub firewall_id: Option<u64>,
    pub protocol: Option<String>,
    pub action: Option<String>,
}

impl RuleListFilter {
    pub(crate) fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(id) = self.firewall_id {
            params.push(("firewall_id", id.to_string()));
        }
        if let Some(ref p) = self.protocol {
            params.push(("protocol", p.to_uppercase()));
        }
        if let Some(ref a) = self.action {
            params.push(("action", a.to_uppercase()));
        }
        params
    }
}

// ── Firewall rule domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use super::entity_id::{FirewallId, RuleId, SegmentId};

/// Transport protocol a rule applies to. `Any` matches every protocol.
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
#[serde(rename_all = "UPPERCASE", try_from = "String")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    Any,
}

impl TryFrom<String> for Protocol {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.trim().parse()
    }
}

/// What a rule does with matching traffic.
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
#[serde(rename_all = "UPPERCASE", try_from = "String")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum RuleAction {
    Allow,
    Deny,
}

impl TryFrom<String> for RuleAction {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.trim().parse()
    }
}

/// A directional firewall rule: governs traffic from `source_segment_id`
/// to `destination_segment_id` only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub firewall_id: FirewallId,
    pub rule_name: String,
    pub source_segment_id: SegmentId,
    pub destination_segment_id: SegmentId,
    pub protocol: Protocol,
    /// Port grammar: `"443"`, `"80,443"`, `"8000-9000"`. Absent or blank
    /// means every port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_range: Option<String>,
    pub action: RuleAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Rule {
    /// The port range with blank strings normalized to `None`.
    pub fn port_range(&self) -> Option<&str> {
        self.port_range
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn is_allow(&self) -> bool {
        self.action == RuleAction::Allow
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn protocol_parses_any_case() {
        assert_eq!("tcp".parse::<Protocol>().unwrap(), Protocol::Tcp);
        assert_eq!("Any".parse::<Protocol>().unwrap(), Protocol::Any);
        assert_eq!(Protocol::Icmp.to_string(), "ICMP");
        assert!("SCTP".parse::<Protocol>().is_err());
    }

    #[test]
    fn action_serde_uppercase() {
        assert_eq!(serde_json::to_string(&RuleAction::Deny).unwrap(), "\"DENY\"");
        let a: RuleAction = serde_json::from_str("\"allow\"").unwrap();
        assert_eq!(a, RuleAction::Allow);
    }

    #[test]
    fn blank_port_range_is_absent() {
        let rule: Rule = serde_json::from_value(serde_json::json!({
            "id": 1,
            "firewall_id": 1,
            "rule_name": "r",
            "source_segment_id": 1,
            "destination_segment_id": 2,
            "protocol": "TCP",
            "port_range": "   ",
            "action": "ALLOW"
        }))
        .unwrap();
        assert_eq!(rule.port_range(), None);
        assert!(rule.is_allow());
    }
}

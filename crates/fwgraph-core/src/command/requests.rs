// ── Typed request structs for Command payloads ──
//
// Create requests carry every required field; update requests are
// partial and merged onto the current entity before being written, so
// the backend always receives a full body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::segment::default_color;
use crate::model::{
    FirewallId, Protocol, Rule, RuleAction, RuleId, Segment, SegmentId, ZoneType,
};

/// Empty strings clear optional text fields.
fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

// ── Segment ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSegmentRequest {
    pub name: String,
    pub ip_range: String,
    pub zone_type: ZoneType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CreateSegmentRequest {
    pub(crate) fn into_segment(self, id: SegmentId, now: DateTime<Utc>) -> Segment {
        Segment {
            id,
            name: self.name.trim().to_owned(),
            ip_range: self.ip_range.trim().to_owned(),
            zone_type: self.zone_type,
            color: self.color.unwrap_or_else(default_color),
            description: self.description.as_deref().and_then(non_empty),
            created_at: Some(now),
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSegmentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_type: Option<ZoneType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UpdateSegmentRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.ip_range.is_none()
            && self.zone_type.is_none()
            && self.color.is_none()
            && self.description.is_none()
    }

    /// Apply the set fields onto `current`.
    pub(crate) fn merge(&self, current: &Segment, now: DateTime<Utc>) -> Segment {
        let mut seg = current.clone();
        if let Some(ref name) = self.name {
            seg.name = name.trim().to_owned();
        }
        if let Some(ref ip_range) = self.ip_range {
            seg.ip_range = ip_range.trim().to_owned();
        }
        if let Some(zone_type) = self.zone_type {
            seg.zone_type = zone_type;
        }
        if let Some(ref color) = self.color {
            seg.color.clone_from(color);
        }
        if let Some(ref description) = self.description {
            seg.description = non_empty(description);
        }
        seg.updated_at = Some(now);
        seg
    }
}

// ── Rule ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRuleRequest {
    pub firewall_id: FirewallId,
    pub rule_name: String,
    pub source_segment_id: SegmentId,
    pub destination_segment_id: SegmentId,
    pub protocol: Protocol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_range: Option<String>,
    pub action: RuleAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CreateRuleRequest {
    pub(crate) fn into_rule(self, id: RuleId, now: DateTime<Utc>) -> Rule {
        Rule {
            id,
            firewall_id: self.firewall_id,
            rule_name: self.rule_name.trim().to_owned(),
            source_segment_id: self.source_segment_id,
            destination_segment_id: self.destination_segment_id,
            protocol: self.protocol,
            port_range: self.port_range.as_deref().and_then(non_empty),
            action: self.action,
            description: self.description.as_deref().and_then(non_empty),
            created_at: Some(now),
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRuleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firewall_id: Option<FirewallId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_segment_id: Option<SegmentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_segment_id: Option<SegmentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    /// `Some("")` clears the range (all ports).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<RuleAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UpdateRuleRequest {
    pub fn is_empty(&self) -> bool {
        self.firewall_id.is_none()
            && self.rule_name.is_none()
            && self.source_segment_id.is_none()
            && self.destination_segment_id.is_none()
            && self.protocol.is_none()
            && self.port_range.is_none()
            && self.action.is_none()
            && self.description.is_none()
    }

    pub(crate) fn merge(&self, current: &Rule, now: DateTime<Utc>) -> Rule {
        let mut rule = current.clone();
        if let Some(firewall_id) = self.firewall_id {
            rule.firewall_id = firewall_id;
        }
        if let Some(ref name) = self.rule_name {
            rule.rule_name = name.trim().to_owned();
        }
        if let Some(src) = self.source_segment_id {
            rule.source_segment_id = src;
        }
        if let Some(dst) = self.destination_segment_id {
            rule.destination_segment_id = dst;
        }
        if let Some(protocol) = self.protocol {
            rule.protocol = protocol;
        }
        if let Some(ref ports) = self.port_range {
            rule.port_range = non_empty(ports);
        }
        if let Some(action) = self.action {
            rule.action = action;
        }
        if let Some(ref description) = self.description {
            rule.description = non_empty(description);
        }
        rule.updated_at = Some(now);
        rule
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment() -> Segment {
        Segment {
            id: SegmentId(1),
            name: "Web".into(),
            ip_range: "10.0.2.0/24".into(),
            zone_type: ZoneType::Internal,
            color: "#4ECDC4".into(),
            description: Some("Frontend".into()),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn segment_merge_keeps_unset_fields() {
        let req = UpdateSegmentRequest {
            zone_type: Some(ZoneType::Dmz),
            description: Some(String::new()),
            ..Default::default()
        };
        let merged = req.merge(&segment(), Utc::now());
        assert_eq!(merged.name, "Web");
        assert_eq!(merged.zone_type, ZoneType::Dmz);
        assert!(merged.description.is_none());
        assert!(merged.updated_at.is_some());
    }

    #[test]
    fn create_rule_normalizes_blank_ports() {
        let req = CreateRuleRequest {
            firewall_id: FirewallId(1),
            rule_name: " ssh ".into(),
            source_segment_id: SegmentId(1),
            destination_segment_id: SegmentId(2),
            protocol: Protocol::Tcp,
            port_range: Some("  ".into()),
            action: RuleAction::Allow,
            description: None,
        };
        let rule = req.into_rule(RuleId(3), Utc::now());
        assert_eq!(rule.rule_name, "ssh");
        assert!(rule.port_range.is_none());
    }

    #[test]
    fn empty_update_detected() {
        assert!(UpdateRuleRequest::default().is_empty());
        assert!(UpdateSegmentRequest::default().is_empty());
    }
}

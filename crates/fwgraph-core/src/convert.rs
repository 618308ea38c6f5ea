// ── API-to-domain type conversions ──
//
// Bridges raw `fwgraph_api::types` into canonical `fwgraph_core::model`
// types. Enumerated fields arrive as strings; a record whose zone type,
// protocol or action cannot be parsed is rejected so the caller can skip
// it with a warning instead of failing the whole refresh.

use chrono::{DateTime, NaiveDateTime, Utc};

use fwgraph_api::types::{
    FirewallResponse, RuleCreateUpdate, RuleResponse, SegmentCreateUpdate, SegmentResponse,
};

use crate::error::CoreError;
use crate::model::{
    Firewall, FirewallId, Protocol, Rule, RuleAction, RuleId, Segment, SegmentId, ZoneType,
};

// ── Helpers ────────────────────────────────────────────────────────

/// Parse a backend timestamp. Accepts RFC 3339 and the naive
/// `YYYY-MM-DDTHH:MM:SS[.ffffff]` form (interpreted as UTC).
fn parse_datetime(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn invalid_field(entity: &str, id: u64, field: &str, value: &str) -> CoreError {
    CoreError::ValidationFailed {
        message: format!("{entity} {id}: unrecognized {field} '{value}'"),
    }
}

// ── Segment ────────────────────────────────────────────────────────

impl TryFrom<SegmentResponse> for Segment {
    type Error = CoreError;

    fn try_from(raw: SegmentResponse) -> Result<Self, Self::Error> {
        let zone_type: ZoneType = raw
            .zone_type
            .parse()
            .map_err(|_| invalid_field("segment", raw.id, "zone_type", &raw.zone_type))?;

        Ok(Segment {
            id: SegmentId(raw.id),
            name: raw.name,
            ip_range: raw.ip_range,
            zone_type,
            color: raw.color,
            description: raw.description,
            created_at: parse_datetime(raw.created_at.as_deref()),
            updated_at: parse_datetime(raw.updated_at.as_deref()),
        })
    }
}

// ── Rule ───────────────────────────────────────────────────────────

impl TryFrom<RuleResponse> for Rule {
    type Error = CoreError;

    fn try_from(raw: RuleResponse) -> Result<Self, Self::Error> {
        let protocol: Protocol = raw
            .protocol
            .parse()
            .map_err(|_| invalid_field("rule", raw.id, "protocol", &raw.protocol))?;
        let action: RuleAction = raw
            .action
            .parse()
            .map_err(|_| invalid_field("rule", raw.id, "action", &raw.action))?;

        Ok(Rule {
            id: RuleId(raw.id),
            firewall_id: FirewallId(raw.firewall_id),
            rule_name: raw.rule_name,
            source_segment_id: SegmentId(raw.source_segment_id),
            destination_segment_id: SegmentId(raw.destination_segment_id),
            protocol,
            port_range: raw.port_range,
            action,
            description: raw.description,
            created_at: parse_datetime(raw.created_at.as_deref()),
            updated_at: parse_datetime(raw.updated_at.as_deref()),
        })
    }
}

// ── Firewall ───────────────────────────────────────────────────────

impl From<FirewallResponse> for Firewall {
    fn from(raw: FirewallResponse) -> Self {
        Firewall {
            id: FirewallId(raw.id),
            name: raw.name,
            vendor: raw.vendor,
            model: raw.model,
            management_ip: raw.management_ip,
            created_at: parse_datetime(raw.created_at.as_deref()),
            updated_at: parse_datetime(raw.updated_at.as_deref()),
        }
    }
}

// ── Domain-to-wire (write bodies) ──────────────────────────────────

impl From<&Segment> for SegmentCreateUpdate {
    fn from(seg: &Segment) -> Self {
        SegmentCreateUpdate {
            name: seg.name.clone(),
            ip_range: seg.ip_range.clone(),
            zone_type: seg.zone_type.to_string(),
            color: seg.color.clone(),
            description: seg.description.clone(),
        }
    }
}

impl From<&Rule> for RuleCreateUpdate {
    fn from(rule: &Rule) -> Self {
        RuleCreateUpdate {
            firewall_id: rule.firewall_id.get(),
            rule_name: rule.rule_name.clone(),
            source_segment_id: rule.source_segment_id.get(),
            destination_segment_id: rule.destination_segment_id.get(),
            protocol: rule.protocol.to_string(),
            port_range: rule.port_range.clone(),
            action: rule.action.to_string(),
            description: rule.description.clone(),
        }
    }
}

/// Convert a batch of wire records, skipping (and logging) the ones that
/// fail to parse.
pub(crate) fn convert_lossy<W, D>(raw: Vec<W>, kind: &str) -> Vec<D>
where
    D: TryFrom<W, Error = CoreError>,
{
    raw.into_iter()
        .filter_map(|item| match D::try_from(item) {
            Ok(d) => Some(d),
            Err(e) => {
                tracing::warn!(kind, error = %e, "skipping unparseable record");
                None
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn raw_rule(protocol: &str, action: &str) -> RuleResponse {
        RuleResponse {
            id: 5,
            firewall_id: 1,
            rule_name: "web-to-app".into(),
            source_segment_id: 1,
            destination_segment_id: 2,
            protocol: protocol.into(),
            port_range: Some("8080".into()),
            action: action.into(),
            description: None,
            created_at: Some("2025-01-15T09:30:00.123456".into()),
            updated_at: None,
            source_segment_name: None,
            source_segment_ip: None,
            destination_segment_name: None,
            destination_segment_ip: None,
        }
    }

    #[test]
    fn rule_from_wire() {
        let rule = Rule::try_from(raw_rule("tcp", "ALLOW")).unwrap();
        assert_eq!(rule.id, RuleId(5));
        assert_eq!(rule.protocol, Protocol::Tcp);
        assert_eq!(rule.action, RuleAction::Allow);
        assert!(rule.created_at.is_some());
    }

    #[test]
    fn unknown_action_is_rejected() {
        let err = Rule::try_from(raw_rule("TCP", "REJECT")).unwrap_err();
        assert!(err.to_string().contains("action"));
    }

    #[test]
    fn lossy_conversion_skips_bad_records() {
        let rules: Vec<Rule> = convert_lossy(
            vec![raw_rule("TCP", "ALLOW"), raw_rule("GRE", "ALLOW")],
            "rule",
        );
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn rfc3339_timestamps_parse() {
        let dt = parse_datetime(Some("2025-03-01T12:00:00Z")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-03-01T12:00:00+00:00");
        assert!(parse_datetime(Some("yesterday")).is_none());
    }
}

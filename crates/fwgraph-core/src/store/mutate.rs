// ── Validated writes ──
//
// Used when the store itself is the system of record (snapshot files and
// in-memory sources). Enforces the same constraints the REST backend
// does: CIDR syntax, unique segment names, rule endpoints that exist, a
// parseable port range, and no deleting segments that rules still use.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;
use ipnet::IpNet;

use super::DataStore;
use crate::command::requests::{
    CreateRuleRequest, CreateSegmentRequest, UpdateRuleRequest, UpdateSegmentRequest,
};
use crate::error::CoreError;
use crate::graph::matcher::PortSpec;
use crate::model::{Rule, RuleId, Segment, SegmentId};

// ── Stateless field checks ───────────────────────────────────────────

/// Accepts `a.b.c.d/len`, IPv6 prefixes, and bare addresses (treated as a
/// host route). Host bits may be set.
pub(crate) fn validate_cidr(ip_range: &str) -> Result<(), CoreError> {
    let trimmed = ip_range.trim();
    if trimmed.parse::<IpNet>().is_ok() || trimmed.parse::<IpAddr>().is_ok() {
        Ok(())
    } else {
        Err(CoreError::ValidationFailed {
            message: format!("Invalid CIDR format: {ip_range}"),
        })
    }
}

pub(crate) fn validate_segment_fields(segment: &Segment) -> Result<(), CoreError> {
    if segment.name.trim().is_empty() {
        return Err(CoreError::ValidationFailed {
            message: "segment name must not be empty".into(),
        });
    }
    validate_cidr(&segment.ip_range)
}

pub(crate) fn validate_rule_fields(rule: &Rule) -> Result<(), CoreError> {
    if rule.rule_name.trim().is_empty() {
        return Err(CoreError::ValidationFailed {
            message: "rule name must not be empty".into(),
        });
    }
    if let Some(ports) = rule.port_range() {
        ports
            .parse::<PortSpec>()
            .map_err(|e| CoreError::ValidationFailed {
                message: format!("invalid port range '{ports}': {e}"),
            })?;
    }
    Ok(())
}

// ── Store-backed writes ──────────────────────────────────────────────

impl DataStore {
    fn next_segment_id(&self) -> SegmentId {
        SegmentId(self.segments.max_id().map_or(1, |id| id.get() + 1))
    }

    fn next_rule_id(&self) -> RuleId {
        RuleId(self.rules.max_id().map_or(1, |id| id.get() + 1))
    }

    fn ensure_unique_name(&self, name: &str, except: Option<SegmentId>) -> Result<(), CoreError> {
        match self.segment_by_name(name) {
            Some(existing) if Some(existing.id) != except => Err(CoreError::Conflict {
                message: format!("Network segment with this name already exists: {name}"),
            }),
            _ => Ok(()),
        }
    }

    fn ensure_rule_references(&self, rule: &Rule) -> Result<(), CoreError> {
        for (endpoint, id) in [
            ("source", rule.source_segment_id),
            ("destination", rule.destination_segment_id),
        ] {
            if !self.segments.contains(&id) {
                return Err(CoreError::DataIntegrity {
                    message: format!("{endpoint} segment {id} does not exist"),
                });
            }
        }
        // Snapshots without a firewall inventory accept any firewall id.
        if !self.firewalls.is_empty() && !self.firewalls.contains(&rule.firewall_id) {
            return Err(CoreError::DataIntegrity {
                message: format!("firewall {} does not exist", rule.firewall_id),
            });
        }
        Ok(())
    }

    // ── Segments ─────────────────────────────────────────────────────

    pub fn create_segment(&self, req: CreateSegmentRequest) -> Result<Arc<Segment>, CoreError> {
        let _guard = self.lock_writes();

        let segment = req.into_segment(self.next_segment_id(), Utc::now());
        validate_segment_fields(&segment)?;
        self.ensure_unique_name(&segment.name, None)?;

        let id = segment.id;
        self.segments.upsert(id, segment);
        self.mark_changed();
        self.segments
            .get(&id)
            .ok_or_else(|| CoreError::Internal(format!("segment {id} vanished after insert")))
    }

    pub fn update_segment(
        &self,
        id: SegmentId,
        req: &UpdateSegmentRequest,
    ) -> Result<Arc<Segment>, CoreError> {
        let _guard = self.lock_writes();

        let current = self
            .segments
            .get(&id)
            .ok_or_else(|| CoreError::not_found("segment", id))?;
        let segment = req.merge(&current, Utc::now());
        validate_segment_fields(&segment)?;
        self.ensure_unique_name(&segment.name, Some(id))?;

        self.segments.upsert(id, segment);
        self.mark_changed();
        self.segments
            .get(&id)
            .ok_or_else(|| CoreError::Internal(format!("segment {id} vanished after update")))
    }

    /// Delete a segment. Fails with `Conflict` while any rule references it.
    pub fn delete_segment(&self, id: SegmentId) -> Result<(), CoreError> {
        let _guard = self.lock_writes();

        if !self.segments.contains(&id) {
            return Err(CoreError::not_found("segment", id));
        }

        let referencing: Vec<String> = self
            .rules
            .snapshot()
            .iter()
            .filter(|r| r.source_segment_id == id || r.destination_segment_id == id)
            .map(|r| r.id.to_string())
            .collect();
        if !referencing.is_empty() {
            return Err(CoreError::Conflict {
                message: format!(
                    "segment {id} is referenced by rule(s) {}",
                    referencing.join(", ")
                ),
            });
        }

        self.segments.remove(&id);
        self.mark_changed();
        Ok(())
    }

    // ── Rules ────────────────────────────────────────────────────────

    pub fn create_rule(&self, req: CreateRuleRequest) -> Result<Arc<Rule>, CoreError> {
        let _guard = self.lock_writes();

        let rule = req.into_rule(self.next_rule_id(), Utc::now());
        validate_rule_fields(&rule)?;
        self.ensure_rule_references(&rule)?;

        let id = rule.id;
        self.rules.upsert(id, rule);
        self.mark_changed();
        self.rules
            .get(&id)
            .ok_or_else(|| CoreError::Internal(format!("rule {id} vanished after insert")))
    }

    pub fn update_rule(&self, id: RuleId, req: &UpdateRuleRequest) -> Result<Arc<Rule>, CoreError> {
        let _guard = self.lock_writes();

        let current = self
            .rules
            .get(&id)
            .ok_or_else(|| CoreError::not_found("rule", id))?;
        let rule = req.merge(&current, Utc::now());
        validate_rule_fields(&rule)?;
        self.ensure_rule_references(&rule)?;

        self.rules.upsert(id, rule);
        self.mark_changed();
        self.rules
            .get(&id)
            .ok_or_else(|| CoreError::Internal(format!("rule {id} vanished after update")))
    }

    /// Delete every listed rule that exists. Returns how many were removed.
    pub fn delete_rules(&self, ids: &[RuleId]) -> usize {
        let _guard = self.lock_writes();

        let deleted = ids
            .iter()
            .filter(|id| self.rules.remove(id).is_some())
            .count();
        if deleted > 0 {
            self.mark_changed();
        }
        deleted
    }
}

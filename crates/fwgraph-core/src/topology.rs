// ── Topology view ──
//
// Display-oriented graph: one node per segment and one merged edge per
// (source, destination) pair, labelled with the protocols and actions of
// the rules on it. Unlike `PolicyGraph` this keeps every rule, DENY
// included, and does not parse port ranges.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::{Protocol, Rule, RuleAction, RuleId, Segment, SegmentId, ZoneType};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyFilter {
    /// Keep only segments in these zones. Empty = all.
    #[serde(default)]
    pub zone_types: Vec<ZoneType>,
    /// Keep only rules with these protocols. Empty = all.
    #[serde(default)]
    pub protocols: Vec<Protocol>,
    #[serde(default)]
    pub action: Option<RuleAction>,
}

impl TopologyFilter {
    fn keeps_segment(&self, segment: &Segment) -> bool {
        self.zone_types.is_empty() || self.zone_types.contains(&segment.zone_type)
    }

    fn keeps_rule(&self, rule: &Rule) -> bool {
        (self.protocols.is_empty() || self.protocols.contains(&rule.protocol))
            && self.action.is_none_or(|a| a == rule.action)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyNode {
    /// `segment-{id}`
    pub id: String,
    pub segment_id: SegmentId,
    pub label: String,
    pub ip_range: String,
    pub zone_type: ZoneType,
    pub color: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeMetadata {
    pub rule_ids: Vec<RuleId>,
    pub protocols: Vec<String>,
    pub ports: Vec<String>,
    pub actions: Vec<String>,
    pub descriptions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyEdge {
    /// `edge-{src}-{dst}`
    pub id: String,
    #[serde(rename = "from")]
    pub source: String,
    #[serde(rename = "to")]
    pub target: String,
    /// `"PROTOS (ACTIONS)"`, each list sorted and comma-joined.
    pub label: String,
    pub metadata: EdgeMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyView {
    pub nodes: Vec<TopologyNode>,
    pub edges: Vec<TopologyEdge>,
}

fn node_id(id: SegmentId) -> String {
    format!("segment-{id}")
}

#[derive(Default)]
struct EdgeAccumulator {
    rule_ids: Vec<RuleId>,
    protocols: BTreeSet<String>,
    ports: BTreeSet<String>,
    actions: BTreeSet<String>,
    descriptions: Vec<String>,
}

impl TopologyView {
    /// Build the view. Rules whose endpoints were filtered out (or do not
    /// exist) are left out; edges appear in order of their first rule id.
    pub fn build(segments: &[Arc<Segment>], rules: &[Arc<Rule>], filter: &TopologyFilter) -> Self {
        let mut kept: Vec<&Arc<Segment>> =
            segments.iter().filter(|s| filter.keeps_segment(s)).collect();
        kept.sort_by_key(|s| s.id);

        let ids: HashSet<SegmentId> = kept.iter().map(|s| s.id).collect();
        let nodes = kept
            .iter()
            .map(|s| TopologyNode {
                id: node_id(s.id),
                segment_id: s.id,
                label: s.name.clone(),
                ip_range: s.ip_range.clone(),
                zone_type: s.zone_type,
                color: s.color.clone(),
                description: s.description.clone(),
            })
            .collect();

        let mut sorted_rules: Vec<&Arc<Rule>> = rules.iter().collect();
        sorted_rules.sort_by_key(|r| r.id);

        let mut grouped: IndexMap<(SegmentId, SegmentId), EdgeAccumulator> = IndexMap::new();
        for rule in sorted_rules {
            if !filter.keeps_rule(rule)
                || !ids.contains(&rule.source_segment_id)
                || !ids.contains(&rule.destination_segment_id)
            {
                continue;
            }
            let acc = grouped
                .entry((rule.source_segment_id, rule.destination_segment_id))
                .or_default();
            acc.rule_ids.push(rule.id);
            acc.protocols.insert(rule.protocol.to_string());
            acc.actions.insert(rule.action.to_string());
            if let Some(ports) = rule.port_range() {
                acc.ports.insert(ports.to_owned());
            }
            if let Some(desc) = rule.description.as_deref().filter(|d| !d.is_empty()) {
                acc.descriptions.push(desc.to_owned());
            }
        }

        let edges = grouped
            .into_iter()
            .map(|((src, dst), acc)| {
                let protocols: Vec<String> = acc.protocols.into_iter().collect();
                let actions: Vec<String> = acc.actions.into_iter().collect();
                TopologyEdge {
                    id: format!("edge-{src}-{dst}"),
                    source: node_id(src),
                    target: node_id(dst),
                    label: format!("{} ({})", protocols.join(", "), actions.join(", ")),
                    metadata: EdgeMetadata {
                        rule_ids: acc.rule_ids,
                        protocols,
                        ports: acc.ports.into_iter().collect(),
                        actions,
                        descriptions: acc.descriptions,
                    },
                }
            })
            .collect();

        Self { nodes, edges }
    }
}

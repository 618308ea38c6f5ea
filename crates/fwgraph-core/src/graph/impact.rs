// ── Rule impact analysis ──
//
// For every ordered pair (u, v), u != v, compare the chosen path with the
// rule present against the chosen path with the rule excluded. A pair is
// affected when reachability or the path itself changes.
//
// The comparison runs once per probe of the rule's traffic class. ANY is
// split into TCP, UDP and ICMP. Each protocol's port space is cut at the
// start and end+1 of every port range in the graph that applies to it, so
// one port per interval stands in for every port in that interval: all
// rules treat the ports of one interval alike. A rule with no port range
// and no cuts probes the unspecified port. BFS parent pointers do not
// depend on the target, so one tree per source and probe answers every
// destination: O(S * (S + E)) per probe.

use std::collections::{BTreeSet, HashSet};
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use super::deadline::Deadline;
use super::matcher::{PortFilter, PortRange, protocol_matches};
use super::path::{SearchTree, search_tree};
use super::{CompiledRule, PolicyGraph, Traffic};
use crate::error::CoreError;
use crate::model::{Protocol, Rule, RuleAction, RuleId, SegmentId};

// ── Limits ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImpactLimits {
    /// Refuse to analyze graphs with more segments than this.
    pub max_segments: usize,
}

impl Default for ImpactLimits {
    fn default() -> Self {
        Self { max_segments: 500 }
    }
}

// ── Report types ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentRef {
    pub id: SegmentId,
    pub name: String,
}

/// How removing the rule changes one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImpactStatus {
    /// Reachable now, unreachable without the rule.
    Blocked,
    /// Still reachable without the rule, over a different path.
    Rerouted { via: Vec<SegmentRef> },
    /// Unreachable now, reachable without the rule (removing a DENY).
    Opened { via: Vec<SegmentRef> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedConnection {
    pub source: SegmentRef,
    pub destination: SegmentRef,
    pub protocol: Protocol,
    pub port: Option<u16>,
    /// Path with the rule present; empty when currently unreachable.
    pub current_path: Vec<SegmentRef>,
    #[serde(flatten)]
    pub status: ImpactStatus,
}

/// A currently reachable connection whose path crosses the rule's edge
/// with the rule among the ALLOW rules permitting that hop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversingPath {
    pub source: SegmentRef,
    pub destination: SegmentRef,
    pub protocol: Protocol,
    pub port: Option<u16>,
    pub path: Vec<SegmentRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactedRule {
    pub rule_id: RuleId,
    pub rule_name: String,
    pub action: RuleAction,
    pub protocol: Protocol,
    pub port_range: Option<String>,
    pub source: SegmentRef,
    pub destination: SegmentRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub rule: ImpactedRule,
    pub segments_analyzed: usize,
    pub probes: usize,
    pub affected: Vec<AffectedConnection>,
    pub traversing: Vec<TraversingPath>,
    pub warning: String,
}

// ── Wire response ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedConnectionWire {
    pub source_segment: String,
    pub destination_segment: String,
    pub protocol: Protocol,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependentPath {
    pub source: String,
    pub destination: String,
    /// Full alternate path, endpoints included.
    pub via: Vec<String>,
}

/// `{affected_connections, dependent_paths, warning}` as served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleImpactResponse {
    pub affected_connections: Vec<AffectedConnectionWire>,
    pub dependent_paths: Vec<DependentPath>,
    pub warning: String,
}

impl ImpactReport {
    /// Report for a rule that exists but was left out of the graph
    /// (dangling endpoint or malformed ports). It carries no traffic, so
    /// removing it changes nothing.
    pub(crate) fn for_unused_rule(
        rule: &Rule,
        source: SegmentRef,
        destination: SegmentRef,
        reason: &str,
    ) -> Self {
        Self {
            warning: format!(
                "Rule '{}' (#{}) is not part of the policy graph ({reason}); removing it changes no connectivity",
                rule.rule_name, rule.id
            ),
            rule: ImpactedRule {
                rule_id: rule.id,
                rule_name: rule.rule_name.clone(),
                action: rule.action,
                protocol: rule.protocol,
                port_range: rule.port_range.clone(),
                source,
                destination,
            },
            segments_analyzed: 0,
            probes: 0,
            affected: Vec::new(),
            traversing: Vec::new(),
        }
    }

    pub fn blocked_count(&self) -> usize {
        self.count(|s| matches!(s, ImpactStatus::Blocked))
    }

    pub fn rerouted_count(&self) -> usize {
        self.count(|s| matches!(s, ImpactStatus::Rerouted { .. }))
    }

    pub fn opened_count(&self) -> usize {
        self.count(|s| matches!(s, ImpactStatus::Opened { .. }))
    }

    fn count(&self, pred: impl Fn(&ImpactStatus) -> bool) -> usize {
        self.affected.iter().filter(|a| pred(&a.status)).count()
    }

    pub fn is_load_bearing(&self) -> bool {
        !self.affected.is_empty()
    }

    pub fn to_response(&self) -> RuleImpactResponse {
        let affected_connections = self
            .affected
            .iter()
            .map(|a| AffectedConnectionWire {
                source_segment: a.source.name.clone(),
                destination_segment: a.destination.name.clone(),
                protocol: a.protocol,
                port: a.port,
            })
            .collect();

        let mut seen = HashSet::new();
        let dependent_paths = self
            .affected
            .iter()
            .filter_map(|a| match &a.status {
                ImpactStatus::Rerouted { via } => Some(DependentPath {
                    source: a.source.name.clone(),
                    destination: a.destination.name.clone(),
                    via: via.iter().map(|s| s.name.clone()).collect(),
                }),
                _ => None,
            })
            .filter(|p| seen.insert(p.clone()))
            .collect();

        RuleImpactResponse {
            affected_connections,
            dependent_paths,
            warning: self.warning.clone(),
        }
    }
}

// ── Probes ─────────────────────────────────────────────────────────

const CONCRETE_PROTOCOLS: [Protocol; 3] = [Protocol::Tcp, Protocol::Udp, Protocol::Icmp];

const ALL_PORTS: PortRange = PortRange {
    start: 0,
    end: u16::MAX,
};

fn probes(graph: &PolicyGraph, rule: &CompiledRule) -> Vec<Traffic> {
    let protocols = match rule.rule.protocol {
        Protocol::Any => CONCRETE_PROTOCOLS.to_vec(),
        p => vec![p],
    };

    let mut out = Vec::new();
    for protocol in protocols {
        let cuts = port_cuts(graph, protocol);
        let ranges = match &rule.ports {
            PortFilter::Ports(spec) => spec.ranges(),
            PortFilter::Any if cuts.is_empty() => {
                out.push(Traffic {
                    protocol: Some(protocol),
                    port: None,
                });
                continue;
            }
            PortFilter::Any => std::slice::from_ref(&ALL_PORTS),
        };

        let mut ports = BTreeSet::new();
        for range in ranges {
            ports.insert(range.start);
            ports.extend(
                cuts.range((
                    Bound::Excluded(u32::from(range.start)),
                    Bound::Included(u32::from(range.end)),
                ))
                    .filter_map(|&c| u16::try_from(c).ok()),
            );
        }
        out.extend(ports.into_iter().map(|port| Traffic {
            protocol: Some(protocol),
            port: Some(port),
        }));
    }
    out
}

/// Interval boundaries of every port range that applies to `protocol`.
fn port_cuts(graph: &PolicyGraph, protocol: Protocol) -> BTreeSet<u32> {
    (0..graph.rule_count())
        .filter_map(|i| graph.compiled(i))
        .filter(|c| protocol_matches(c.rule.protocol, Some(protocol)))
        .filter_map(|c| match &c.ports {
            PortFilter::Ports(spec) => Some(spec.ranges()),
            PortFilter::Any => None,
        })
        .flatten()
        .flat_map(|r| [u32::from(r.start), u32::from(r.end) + 1])
        .collect()
}

// ── Analysis ───────────────────────────────────────────────────────

fn segment_ref(graph: &PolicyGraph, idx: usize) -> Option<SegmentRef> {
    graph.node(idx).map(|s| SegmentRef {
        id: s.id,
        name: s.name.clone(),
    })
}

fn refs(graph: &PolicyGraph, nodes: &[usize]) -> Vec<SegmentRef> {
    nodes
        .iter()
        .filter_map(|&i| segment_ref(graph, i))
        .collect()
}

fn traverses(nodes: &[usize], from: usize, to: usize) -> bool {
    nodes.windows(2).any(|hop| hop == [from, to])
}

/// Analyze what removing `rule_id` from the graph would change.
pub fn analyze_impact(
    graph: &PolicyGraph,
    rule_id: RuleId,
    limits: ImpactLimits,
    deadline: &Deadline,
) -> Result<ImpactReport, CoreError> {
    let position = graph
        .rule_position(rule_id)
        .ok_or_else(|| CoreError::not_found("rule", rule_id))?;
    let compiled = graph
        .compiled(position)
        .ok_or_else(|| CoreError::Internal(format!("rule {rule_id} missing from arena")))?;

    let segments = graph.segment_count();
    if segments > limits.max_segments {
        return Err(CoreError::ScaleLimitExceeded {
            segments,
            limit: limits.max_segments,
        });
    }

    let rule = &compiled.rule;
    let (Some(rule_src), Some(rule_dst)) = (
        graph.node_index(rule.source_segment_id),
        graph.node_index(rule.destination_segment_id),
    ) else {
        return Err(CoreError::Internal(format!(
            "rule {rule_id} endpoints missing from graph"
        )));
    };

    let probes = probes(graph, compiled);
    let mut affected = Vec::new();
    let mut traversing = Vec::new();

    for probe in &probes {
        for u in 0..segments {
            let with = search_tree(graph, u, *probe, None, None, deadline)?;

            // A rule only acts on edges leaving its source. If the search
            // never reaches that source, excluding the rule changes nothing
            // for this origin (reaching the source cannot depend on an edge
            // that leaves it).
            if !with.reaches(rule_src) {
                continue;
            }
            let without = search_tree(graph, u, *probe, Some(position), None, deadline)?;

            compare_trees(
                graph,
                compiled,
                (u, *probe),
                (rule_src, rule_dst),
                (&with, &without),
                &mut affected,
                &mut traversing,
            );
        }
    }

    let mut report = ImpactReport {
        rule: ImpactedRule {
            rule_id: rule.id,
            rule_name: rule.rule_name.clone(),
            action: rule.action,
            protocol: rule.protocol,
            port_range: rule.port_range.clone(),
            source: segment_ref(graph, rule_src).ok_or_else(|| {
                CoreError::Internal(format!("segment index {rule_src} out of range"))
            })?,
            destination: segment_ref(graph, rule_dst).ok_or_else(|| {
                CoreError::Internal(format!("segment index {rule_dst} out of range"))
            })?,
        },
        segments_analyzed: segments,
        probes: probes.len(),
        affected,
        traversing,
        warning: String::new(),
    };
    report.warning = impact_warning(&report);
    Ok(report)
}

fn compare_trees(
    graph: &PolicyGraph,
    compiled: &CompiledRule,
    (u, probe): (usize, Traffic),
    (rule_src, rule_dst): (usize, usize),
    (with, without): (&SearchTree, &SearchTree),
    affected: &mut Vec<AffectedConnection>,
    traversing: &mut Vec<TraversingPath>,
) {
    let Some(source) = segment_ref(graph, u) else {
        return;
    };
    let protocol = probe.protocol.unwrap_or(compiled.rule.protocol);

    for v in (0..graph.segment_count()).filter(|&v| v != u) {
        let before = with.node_path(v);
        let after = without.node_path(v);
        let Some(destination) = segment_ref(graph, v) else {
            continue;
        };

        if let Some(ref nodes) = before {
            if compiled.rule.action == RuleAction::Allow
                && compiled.matches(probe)
                && traverses(nodes, rule_src, rule_dst)
            {
                traversing.push(TraversingPath {
                    source: source.clone(),
                    destination: destination.clone(),
                    protocol,
                    port: probe.port,
                    path: refs(graph, nodes),
                });
            }
        }

        if before == after {
            continue;
        }

        let status = match (&before, &after) {
            (Some(_), None) => ImpactStatus::Blocked,
            (Some(_), Some(alt)) => ImpactStatus::Rerouted {
                via: refs(graph, alt),
            },
            (None, Some(alt)) => ImpactStatus::Opened {
                via: refs(graph, alt),
            },
            (None, None) => continue,
        };

        affected.push(AffectedConnection {
            source: source.clone(),
            destination,
            protocol,
            port: probe.port,
            current_path: before.as_deref().map(|n| refs(graph, n)).unwrap_or_default(),
            status,
        });
    }
}

fn impact_warning(report: &ImpactReport) -> String {
    let rule = &report.rule;
    let label = format!("Rule '{}' (#{})", rule.rule_name, rule.rule_id);

    if !report.is_load_bearing() {
        return format!(
            "{label} is not load-bearing: removing it changes no segment-to-segment connectivity"
        );
    }

    let mut parts = Vec::new();
    let blocked = report.blocked_count();
    let rerouted = report.rerouted_count();
    let opened = report.opened_count();
    if blocked > 0 {
        parts.push(format!("{blocked} would lose connectivity"));
    }
    if rerouted > 0 {
        parts.push(format!("{rerouted} would be rerouted over another path"));
    }
    if opened > 0 {
        parts.push(format!("{opened} currently blocked would become reachable"));
    }

    format!(
        "{label} is critical for {} connection(s): {}",
        report.affected.len(),
        parts.join("; ")
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::super::fixtures::*;
    use super::super::path::{PathQuery, find_path};
    use super::*;

    fn pair_names(report: &ImpactReport) -> Vec<(String, String)> {
        report
            .affected
            .iter()
            .map(|a| (a.source.name.clone(), a.destination.name.clone()))
            .collect()
    }

    #[test]
    fn removing_last_hop_blocks_downstream_pairs() {
        let graph = PolicyGraph::build(&abc(), &[allow(1, 1, 2, "443"), allow(2, 2, 3, "443")]);
        let report =
            analyze_impact(&graph, RuleId(2), ImpactLimits::default(), &Deadline::none()).unwrap();

        assert_eq!(
            pair_names(&report),
            vec![("A".into(), "C".into()), ("B".into(), "C".into())]
        );
        assert!(report
            .affected
            .iter()
            .all(|a| a.status == ImpactStatus::Blocked && a.port == Some(443)));

        let response = report.to_response();
        assert!(response.dependent_paths.is_empty());
        assert!(!response.warning.is_empty());
        assert!(response.warning.contains("lose connectivity"));
    }

    #[test]
    fn alternate_route_is_reported_as_dependent_path() {
        // A -> B -> C, plus a detour A -> D -> E -> C.
        let segments = vec![
            segment(1, "A"),
            segment(2, "B"),
            segment(3, "C"),
            segment(4, "D"),
            segment(5, "E"),
        ];
        let rules = vec![
            allow(1, 1, 2, "443"),
            allow(2, 2, 3, "443"),
            allow(3, 1, 4, "443"),
            allow(4, 4, 5, "443"),
            allow(5, 5, 3, "443"),
        ];
        let graph = PolicyGraph::build(&segments, &rules);
        let report =
            analyze_impact(&graph, RuleId(1), ImpactLimits::default(), &Deadline::none()).unwrap();

        let response = report.to_response();
        let to_c = response
            .dependent_paths
            .iter()
            .find(|p| p.source == "A" && p.destination == "C")
            .unwrap();
        assert_eq!(to_c.via, vec!["A", "D", "E", "C"]);

        // A -> B has no alternative.
        assert!(report.affected.iter().any(|a| a.destination.name == "B"
            && a.source.name == "A"
            && a.status == ImpactStatus::Blocked));
        assert!(report.warning.contains("rerouted"));
    }

    #[test]
    fn redundant_rule_is_not_load_bearing() {
        let graph = PolicyGraph::build(&abc(), &[allow(1, 1, 2, "443"), allow(2, 1, 2, "443")]);
        let report =
            analyze_impact(&graph, RuleId(2), ImpactLimits::default(), &Deadline::none()).unwrap();

        assert!(report.affected.is_empty());
        assert!(report.warning.contains("not load-bearing"));
        // Both rules still carry the traffic.
        assert_eq!(report.traversing.len(), 1);
    }

    #[test]
    fn unaffected_pairs_keep_their_paths_without_the_rule() {
        let segments = vec![segment(1, "A"), segment(2, "B"), segment(3, "C"), segment(4, "D")];
        let rules = vec![
            allow(1, 1, 2, "443"),
            allow(2, 2, 3, "443"),
            allow(3, 3, 4, "443"),
            allow(4, 1, 3, "443"),
        ];
        let graph = PolicyGraph::build(&segments, &rules);
        let report =
            analyze_impact(&graph, RuleId(2), ImpactLimits::default(), &Deadline::none()).unwrap();

        let without: Vec<_> = rules
            .iter()
            .filter(|r| r.id != RuleId(2))
            .cloned()
            .collect();
        let reduced = PolicyGraph::build(&segments, &without);

        let affected: HashSet<_> = report
            .affected
            .iter()
            .map(|a| (a.source.id, a.destination.id))
            .collect();

        for src in &segments {
            for dst in &segments {
                if src.id == dst.id || affected.contains(&(src.id, dst.id)) {
                    continue;
                }
                let query = PathQuery::new(src.id, dst.id)
                    .with_protocol(Protocol::Tcp)
                    .with_port(443);
                let before = find_path(&graph, &query, &Deadline::none()).unwrap();
                let after = find_path(&reduced, &query, &Deadline::none()).unwrap();
                assert_eq!(before.path, after.path, "{} -> {}", src.name, dst.name);
            }
        }
    }

    #[test]
    fn removing_deny_opens_connectivity() {
        let graph = PolicyGraph::build(
            &abc(),
            &[allow(1, 1, 2, "443"), allow(2, 2, 3, "443"), deny(3, 1, 2, "443")],
        );
        let report =
            analyze_impact(&graph, RuleId(3), ImpactLimits::default(), &Deadline::none()).unwrap();

        assert_eq!(report.opened_count(), 2);
        assert!(report.traversing.is_empty());
        assert!(report.warning.contains("become reachable"));
        let opened_to_c = report
            .affected
            .iter()
            .find(|a| a.destination.name == "C")
            .unwrap();
        assert!(opened_to_c.current_path.is_empty());
    }

    #[test]
    fn each_port_item_is_probed() {
        let graph = PolicyGraph::build(
            &abc(),
            &[
                allow(1, 1, 2, "80,443"),
                allow(2, 1, 2, "443"),
            ],
        );
        let report =
            analyze_impact(&graph, RuleId(1), ImpactLimits::default(), &Deadline::none()).unwrap();

        assert_eq!(report.probes, 2);
        // Port 80 depends on rule 1 alone; 443 is also carried by rule 2.
        assert_eq!(report.affected.len(), 1);
        assert_eq!(report.affected[0].port, Some(80));
    }

    #[test]
    fn any_protocol_rule_is_checked_per_protocol() {
        let graph = PolicyGraph::build(
            &abc(),
            &[rule(1, 1, 2, Protocol::Any, None, RuleAction::Allow)],
        );
        let report =
            analyze_impact(&graph, RuleId(1), ImpactLimits::default(), &Deadline::none()).unwrap();

        assert_eq!(report.probes, 3);
        let protocols: Vec<_> = report.affected.iter().map(|a| a.protocol).collect();
        assert_eq!(protocols, vec![Protocol::Tcp, Protocol::Udp, Protocol::Icmp]);
        assert!(report.affected.iter().all(|a| a.port.is_none()));
    }

    #[test]
    fn narrow_deny_does_not_hide_rest_of_allowed_range() {
        let graph = PolicyGraph::build(
            &abc(),
            &[allow(1, 1, 2, "8000-9000"), deny(2, 1, 2, "8000")],
        );
        let report =
            analyze_impact(&graph, RuleId(1), ImpactLimits::default(), &Deadline::none()).unwrap();

        // 8000 is denied either way; 8001-9000 rides on rule 1 alone.
        assert_eq!(report.probes, 2);
        assert!(report.is_load_bearing());
        assert_eq!(pair_names(&report), vec![("A".into(), "B".into())]);
        assert_eq!(report.affected[0].port, Some(8001));
        assert_eq!(report.affected[0].status, ImpactStatus::Blocked);
    }

    #[test]
    fn any_protocol_allow_with_tcp_deny_still_carries_udp() {
        let graph = PolicyGraph::build(
            &abc(),
            &[
                rule(1, 1, 2, Protocol::Any, None, RuleAction::Allow),
                deny(2, 1, 2, "22"),
            ],
        );
        let report =
            analyze_impact(&graph, RuleId(1), ImpactLimits::default(), &Deadline::none()).unwrap();

        assert!(report.is_load_bearing());
        let udp = report
            .affected
            .iter()
            .find(|a| a.protocol == Protocol::Udp)
            .unwrap();
        assert_eq!((udp.source.name.as_str(), udp.destination.name.as_str()), ("A", "B"));
        assert_eq!(udp.port, None);
        assert_eq!(udp.status, ImpactStatus::Blocked);

        // TCP is split around the denied port; 22 itself is never carried.
        let tcp_ports: Vec<_> = report
            .affected
            .iter()
            .filter(|a| a.protocol == Protocol::Tcp)
            .map(|a| a.port)
            .collect();
        assert_eq!(tcp_ports, vec![Some(0), Some(23)]);
    }

    #[test]
    fn unknown_rule_is_not_found() {
        let graph = PolicyGraph::build(&abc(), &[]);
        let err = analyze_impact(&graph, RuleId(9), ImpactLimits::default(), &Deadline::none())
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn scale_limit_is_enforced() {
        let graph = PolicyGraph::build(&abc(), &[allow(1, 1, 2, "443")]);
        let err = analyze_impact(
            &graph,
            RuleId(1),
            ImpactLimits { max_segments: 2 },
            &Deadline::none(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::ScaleLimitExceeded {
                segments: 3,
                limit: 2
            }
        ));
    }

    #[test]
    fn response_wire_shape() {
        let graph = PolicyGraph::build(&abc(), &[allow(1, 1, 2, "443")]);
        let report =
            analyze_impact(&graph, RuleId(1), ImpactLimits::default(), &Deadline::none()).unwrap();
        let json = serde_json::to_value(report.to_response()).unwrap();

        assert_eq!(
            json["affected_connections"],
            serde_json::json!([
                { "source_segment": "A", "destination_segment": "B", "protocol": "TCP", "port": 443 }
            ])
        );
        assert_eq!(json["dependent_paths"], serde_json::json!([]));
        assert!(json["warning"].as_str().unwrap().starts_with("Rule 'R1' (#1)"));
    }
}

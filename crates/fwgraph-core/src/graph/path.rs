// ── Path search ──
//
// Breadth-first search over the policy graph. An edge is passable for a
// traffic class iff at least one ALLOW rule on it matches and no DENY
// rule on it matches. Neighbours are expanded in ascending segment-id
// order, so the first path found is the shortest and ties resolve the
// same way on every run.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::deadline::Deadline;
use super::{CompiledRule, Edge, PolicyGraph, Traffic};
use crate::error::CoreError;
use crate::model::{Protocol, RuleAction, RuleId, SegmentId};

// ── Query / result types ───────────────────────────────────────────

/// Request body of a path analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathQuery {
    pub source_segment_id: SegmentId,
    pub destination_segment_id: SegmentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl PathQuery {
    pub fn new(source: SegmentId, destination: SegmentId) -> Self {
        Self {
            source_segment_id: source,
            destination_segment_id: destination,
            protocol: None,
            port: None,
        }
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub(crate) fn traffic(&self) -> Traffic {
        Traffic {
            protocol: self.protocol,
            port: self.port,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathHop {
    pub segment_id: SegmentId,
    pub segment_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedRule {
    pub rule_id: RuleId,
    pub rule_name: String,
    pub protocol: Protocol,
    pub port_range: Option<String>,
}

impl From<&CompiledRule> for AppliedRule {
    fn from(c: &CompiledRule) -> Self {
        Self {
            rule_id: c.rule.id,
            rule_name: c.rule.rule_name.clone(),
            protocol: c.rule.protocol,
            port_range: c.rule.port_range.clone(),
        }
    }
}

/// Outcome of a path query. Unreachable is a normal result: `reachable`
/// is false and both lists are empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathResult {
    pub reachable: bool,
    pub path: Vec<PathHop>,
    pub rules_applied: Vec<AppliedRule>,
}

impl PathResult {
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            path: Vec::new(),
            rules_applied: Vec::new(),
        }
    }
}

// ── Edge evaluation ────────────────────────────────────────────────

/// DENY takes precedence: one matching DENY blocks the edge no matter how
/// many ALLOW rules match. `excluded` is a rule arena index to ignore.
pub(crate) fn passable(
    graph: &PolicyGraph,
    edge: &Edge,
    traffic: Traffic,
    excluded: Option<usize>,
) -> bool {
    let mut allowed = false;
    for compiled in active_rules(graph, edge, excluded) {
        if !compiled.matches(traffic) {
            continue;
        }
        match compiled.rule.action {
            RuleAction::Deny => return false,
            RuleAction::Allow => allowed = true,
        }
    }
    allowed
}

/// Matching ALLOW rules on an edge, in rule-id order.
pub(crate) fn matching_allows<'g>(
    graph: &'g PolicyGraph,
    edge: &'g Edge,
    traffic: Traffic,
    excluded: Option<usize>,
) -> impl Iterator<Item = &'g CompiledRule> + 'g {
    active_rules(graph, edge, excluded)
        .filter(move |c| c.rule.action == RuleAction::Allow && c.matches(traffic))
}

fn active_rules<'g>(
    graph: &'g PolicyGraph,
    edge: &'g Edge,
    excluded: Option<usize>,
) -> impl Iterator<Item = &'g CompiledRule> + 'g {
    edge.rules
        .iter()
        .filter(move |&&r| Some(r) != excluded)
        .filter_map(move |&r| graph.compiled(r))
}

// ── BFS tree ───────────────────────────────────────────────────────

/// Parent pointers of a BFS from one source. Because parents never depend
/// on the target, one tree answers every destination for that source.
#[derive(Debug, Clone)]
pub(crate) struct SearchTree {
    source: usize,
    parent: Vec<Option<usize>>,
}

impl SearchTree {
    pub(crate) fn reaches(&self, target: usize) -> bool {
        self.parent.get(target).is_some_and(Option::is_some)
    }

    /// Node indices from source to `target`, inclusive. `None` if unreached.
    pub(crate) fn node_path(&self, target: usize) -> Option<Vec<usize>> {
        if !self.reaches(target) {
            return None;
        }
        let mut path = vec![target];
        let mut current = target;
        while current != self.source {
            current = (*self.parent.get(current)?)?;
            path.push(current);
        }
        path.reverse();
        Some(path)
    }
}

/// Run BFS from `source`. Stops early once `stop_at` is dequeued.
pub(crate) fn search_tree(
    graph: &PolicyGraph,
    source: usize,
    traffic: Traffic,
    excluded: Option<usize>,
    stop_at: Option<usize>,
    deadline: &Deadline,
) -> Result<SearchTree, CoreError> {
    let mut parent = vec![None; graph.segment_count()];
    if let Some(slot) = parent.get_mut(source) {
        *slot = Some(source);
    }

    let mut queue = VecDeque::from([source]);
    while let Some(current) = queue.pop_front() {
        deadline.check()?;
        if Some(current) == stop_at {
            break;
        }
        for edge in graph.edges(current) {
            let unvisited = parent.get(edge.target).is_some_and(Option::is_none);
            if unvisited && passable(graph, edge, traffic, excluded) {
                if let Some(slot) = parent.get_mut(edge.target) {
                    *slot = Some(current);
                }
                queue.push_back(edge.target);
            }
        }
    }

    Ok(SearchTree { source, parent })
}

/// Render a node path into the public result shape.
pub(crate) fn render_path(
    graph: &PolicyGraph,
    nodes: &[usize],
    traffic: Traffic,
    excluded: Option<usize>,
) -> PathResult {
    let path = nodes
        .iter()
        .filter_map(|&i| graph.node(i))
        .map(|s| PathHop {
            segment_id: s.id,
            segment_name: s.name.clone(),
        })
        .collect();

    let rules_applied = nodes
        .windows(2)
        .filter_map(|hop| match hop {
            [from, to] => graph.edges(*from).iter().find(|e| e.target == *to),
            _ => None,
        })
        .flat_map(|edge| matching_allows(graph, edge, traffic, excluded))
        .map(AppliedRule::from)
        .collect();

    PathResult {
        reachable: true,
        path,
        rules_applied,
    }
}

// ── Public entry point ─────────────────────────────────────────────

/// Find the shortest permitted path for `query`.
///
/// Unknown source or destination is `NotFound`; no permitted route is a
/// successful `PathResult::unreachable()`.
pub fn find_path(
    graph: &PolicyGraph,
    query: &PathQuery,
    deadline: &Deadline,
) -> Result<PathResult, CoreError> {
    let source = graph
        .node_index(query.source_segment_id)
        .ok_or_else(|| CoreError::not_found("segment", query.source_segment_id))?;
    let target = graph
        .node_index(query.destination_segment_id)
        .ok_or_else(|| CoreError::not_found("segment", query.destination_segment_id))?;

    let traffic = query.traffic();
    let tree = search_tree(graph, source, traffic, None, Some(target), deadline)?;

    Ok(tree
        .node_path(target)
        .map_or_else(PathResult::unreachable, |nodes| {
            render_path(graph, &nodes, traffic, None)
        }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::super::fixtures::*;
    use super::*;

    fn names(result: &PathResult) -> Vec<&str> {
        result.path.iter().map(|h| h.segment_name.as_str()).collect()
    }

    fn rule_ids(result: &PathResult) -> Vec<u64> {
        result.rules_applied.iter().map(|r| r.rule_id.get()).collect()
    }

    fn tcp(src: u64, dst: u64, port: u16) -> PathQuery {
        PathQuery::new(SegmentId(src), SegmentId(dst))
            .with_protocol(Protocol::Tcp)
            .with_port(port)
    }

    #[test]
    fn two_hop_path_reports_both_rules() {
        let graph = PolicyGraph::build(
            &abc(),
            &[allow(1, 1, 2, "443"), allow(2, 2, 3, "443")],
        );
        let result = find_path(&graph, &tcp(1, 3, 443), &Deadline::none()).unwrap();

        assert!(result.reachable);
        assert_eq!(names(&result), vec!["A", "B", "C"]);
        assert_eq!(rule_ids(&result), vec![1, 2]);
    }

    #[test]
    fn deny_on_edge_blocks_path() {
        let graph = PolicyGraph::build(
            &abc(),
            &[
                allow(1, 1, 2, "443"),
                allow(2, 2, 3, "443"),
                deny(3, 1, 2, "443"),
            ],
        );
        let result = find_path(&graph, &tcp(1, 3, 443), &Deadline::none()).unwrap();
        assert_eq!(result, PathResult::unreachable());
    }

    #[test]
    fn deny_for_other_port_does_not_block() {
        let graph = PolicyGraph::build(&abc(), &[allow(1, 1, 2, "443"), deny(2, 1, 2, "22")]);
        let result = find_path(&graph, &tcp(1, 2, 443), &Deadline::none()).unwrap();
        assert!(result.reachable);
    }

    #[test]
    fn self_path_is_trivially_reachable() {
        let graph = PolicyGraph::build(&abc(), &[]);
        let result = find_path(&graph, &tcp(2, 2, 80), &Deadline::none()).unwrap();

        assert!(result.reachable);
        assert_eq!(names(&result), vec!["B"]);
        assert!(result.rules_applied.is_empty());
    }

    #[test]
    fn no_route_is_unreachable_not_error() {
        let graph = PolicyGraph::build(&abc(), &[allow(1, 1, 2, "443")]);
        let result = find_path(&graph, &tcp(1, 3, 443), &Deadline::none()).unwrap();
        assert!(!result.reachable);
        assert!(result.path.is_empty());
        assert!(result.rules_applied.is_empty());
    }

    #[test]
    fn rules_are_directional() {
        let graph = PolicyGraph::build(&abc(), &[allow(1, 1, 2, "443")]);
        let result = find_path(&graph, &tcp(2, 1, 443), &Deadline::none()).unwrap();
        assert!(!result.reachable);
    }

    #[test]
    fn unknown_segment_is_not_found() {
        let graph = PolicyGraph::build(&abc(), &[]);
        let err = find_path(&graph, &tcp(1, 99, 443), &Deadline::none()).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { ref identifier, .. } if identifier == "99"));
    }

    #[test]
    fn all_matching_allows_reported_in_id_order() {
        let graph = PolicyGraph::build(
            &abc(),
            &[
                allow(7, 1, 2, "443"),
                allow(4, 1, 2, "400-500"),
                allow(5, 1, 2, "22"),
            ],
        );
        let result = find_path(&graph, &tcp(1, 2, 443), &Deadline::none()).unwrap();
        assert_eq!(rule_ids(&result), vec![4, 7]);
    }

    #[test]
    fn shortest_path_wins_with_lowest_id_tie_break() {
        // 1 -> 2 -> 4 and 1 -> 3 -> 4 are both two hops; 1 -> 3 -> 5 -> 4 is longer.
        let segments = vec![
            segment(1, "S"),
            segment(2, "L"),
            segment(3, "R"),
            segment(4, "T"),
            segment(5, "X"),
        ];
        let rules = vec![
            allow(1, 1, 3, "80"),
            allow(2, 1, 2, "80"),
            allow(3, 3, 4, "80"),
            allow(4, 2, 4, "80"),
            allow(5, 3, 5, "80"),
            allow(6, 5, 4, "80"),
        ];
        let graph = PolicyGraph::build(&segments, &rules);

        let result = find_path(&graph, &tcp(1, 4, 80), &Deadline::none()).unwrap();
        assert_eq!(names(&result), vec!["S", "L", "T"]);
        assert_eq!(rule_ids(&result), vec![2, 4]);
    }

    #[test]
    fn cycles_terminate() {
        let graph = PolicyGraph::build(
            &abc(),
            &[allow(1, 1, 2, "80"), allow(2, 2, 1, "80"), allow(3, 2, 2, "80")],
        );
        let result = find_path(&graph, &tcp(1, 3, 80), &Deadline::none()).unwrap();
        assert!(!result.reachable);
    }

    #[test]
    fn unspecified_traffic_uses_any_matching_allow() {
        let graph = PolicyGraph::build(&abc(), &[allow(1, 1, 2, "443")]);
        let query = PathQuery::new(SegmentId(1), SegmentId(2));
        assert!(find_path(&graph, &query, &Deadline::none()).unwrap().reachable);
    }

    #[test]
    fn expired_deadline_times_out() {
        let graph = PolicyGraph::build(&abc(), &[allow(1, 1, 2, "443")]);
        let deadline = Deadline::after(std::time::Duration::ZERO);
        let err = find_path(&graph, &tcp(1, 2, 443), &deadline).unwrap_err();
        assert!(matches!(err, CoreError::Timeout { .. }));
    }

    #[test]
    fn result_serializes_to_wire_shape() {
        let graph = PolicyGraph::build(&abc(), &[allow(1, 1, 2, "443")]);
        let result = find_path(&graph, &tcp(1, 2, 443), &Deadline::none()).unwrap();
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "reachable": true,
                "path": [
                    { "segment_id": 1, "segment_name": "A" },
                    { "segment_id": 2, "segment_name": "B" }
                ],
                "rules_applied": [
                    { "rule_id": 1, "rule_name": "R1", "protocol": "TCP", "port_range": "443" }
                ]
            })
        );
    }
}

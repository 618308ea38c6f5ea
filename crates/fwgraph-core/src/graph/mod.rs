// ── Policy graph ──
//
// Directed graph derived from a store snapshot. Nodes are segments held
// in an arena sorted by id; an edge u -> v exists iff at least one usable
// rule runs from u to v, and carries those rules' arena indices sorted
// by rule id. Adjacency lists are sorted by target id, which is what
// makes BFS tie-breaking deterministic.
//
// Rules pointing at unknown segments or carrying a malformed port range
// are dropped during the build and recorded as `DataWarning`s.

pub mod deadline;
pub mod impact;
pub mod matcher;
pub mod path;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::model::{Protocol, Rule, RuleId, Segment, SegmentId};
use crate::store::DataStore;
use matcher::{PortFilter, PortSpecError, protocol_matches};

// ── Traffic class ──────────────────────────────────────────────────

/// The protocol/port a search is asking about. `None` = unspecified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Traffic {
    pub protocol: Option<Protocol>,
    pub port: Option<u16>,
}

// ── Compiled rule ──────────────────────────────────────────────────

/// A rule with its port range parsed once at build time.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: Arc<Rule>,
    pub ports: PortFilter,
}

impl CompiledRule {
    pub fn matches(&self, traffic: Traffic) -> bool {
        protocol_matches(self.rule.protocol, traffic.protocol) && self.ports.admits(traffic.port)
    }
}

/// Outgoing edge: target node index plus the rules on that pair.
#[derive(Debug, Clone)]
pub(crate) struct Edge {
    pub(crate) target: usize,
    /// Indices into `PolicyGraph::rules`, sorted by rule id. Never empty.
    pub(crate) rules: Vec<usize>,
}

// ── Data warnings ──────────────────────────────────────────────────

/// A rule that was left out of the graph, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataWarning {
    MissingSegment {
        rule_id: RuleId,
        rule_name: String,
        endpoint: &'static str,
        segment_id: SegmentId,
    },
    MalformedPortRange {
        rule_id: RuleId,
        rule_name: String,
        port_range: String,
        reason: PortSpecError,
    },
    /// A later rule reusing an id already seen; the first one wins.
    DuplicateRuleId { rule_id: RuleId, rule_name: String },
}

impl DataWarning {
    pub fn rule_id(&self) -> RuleId {
        match self {
            Self::MissingSegment { rule_id, .. }
            | Self::MalformedPortRange { rule_id, .. }
            | Self::DuplicateRuleId { rule_id, .. } => *rule_id,
        }
    }
}

impl fmt::Display for DataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSegment {
                rule_id,
                rule_name,
                endpoint,
                segment_id,
            } => write!(
                f,
                "rule {rule_id} ({rule_name}) skipped: {endpoint} segment {segment_id} does not exist"
            ),
            Self::MalformedPortRange {
                rule_id,
                rule_name,
                port_range,
                reason,
            } => write!(
                f,
                "rule {rule_id} ({rule_name}) skipped: port range '{port_range}' is malformed ({reason})"
            ),
            Self::DuplicateRuleId { rule_id, rule_name } => write!(
                f,
                "rule {rule_id} ({rule_name}) skipped: another rule already uses id {rule_id}"
            ),
        }
    }
}

// ── PolicyGraph ────────────────────────────────────────────────────

/// Immutable reachability graph. Cheap to share behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct PolicyGraph {
    /// Store version this graph was built from.
    version: u64,
    segments: Vec<Arc<Segment>>,
    index: HashMap<SegmentId, usize>,
    rules: Vec<CompiledRule>,
    rule_index: HashMap<RuleId, usize>,
    adjacency: Vec<Vec<Edge>>,
    warnings: Vec<DataWarning>,
}

impl PolicyGraph {
    /// Build from raw segment and rule lists (any order).
    pub fn build(segments: &[Arc<Segment>], rules: &[Arc<Rule>]) -> Self {
        let mut segments: Vec<Arc<Segment>> = segments.to_vec();
        segments.sort_by_key(|s| s.id);
        segments.dedup_by_key(|s| s.id);

        let index: HashMap<SegmentId, usize> = segments
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id, i))
            .collect();

        // Stable sort: among equal ids, input order decides which one is kept.
        let mut sorted_rules: Vec<&Arc<Rule>> = rules.iter().collect();
        sorted_rules.sort_by_key(|r| r.id);
        let mut seen_ids = HashSet::with_capacity(sorted_rules.len());

        let mut compiled = Vec::with_capacity(sorted_rules.len());
        let mut rule_index = HashMap::with_capacity(sorted_rules.len());
        let mut pairs: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
        let mut warnings = Vec::new();

        for rule in sorted_rules {
            if !seen_ids.insert(rule.id) {
                let warning = DataWarning::DuplicateRuleId {
                    rule_id: rule.id,
                    rule_name: rule.rule_name.clone(),
                };
                warn!(rule_id = %rule.id, "{warning}");
                warnings.push(warning);
                continue;
            }

            let endpoints = [
                ("source", rule.source_segment_id),
                ("destination", rule.destination_segment_id),
            ];
            if let Some((endpoint, segment_id)) =
                endpoints.into_iter().find(|(_, id)| !index.contains_key(id))
            {
                let warning = DataWarning::MissingSegment {
                    rule_id: rule.id,
                    rule_name: rule.rule_name.clone(),
                    endpoint,
                    segment_id,
                };
                warn!(rule_id = %rule.id, "{warning}");
                warnings.push(warning);
                continue;
            }

            let ports = match PortFilter::parse(rule.port_range.as_deref()) {
                Ok(ports) => ports,
                Err(reason) => {
                    let warning = DataWarning::MalformedPortRange {
                        rule_id: rule.id,
                        rule_name: rule.rule_name.clone(),
                        port_range: rule.port_range.clone().unwrap_or_default(),
                        reason,
                    };
                    warn!(rule_id = %rule.id, "{warning}");
                    warnings.push(warning);
                    continue;
                }
            };

            let (Some(&src), Some(&dst)) = (
                index.get(&rule.source_segment_id),
                index.get(&rule.destination_segment_id),
            ) else {
                continue;
            };

            let position = compiled.len();
            compiled.push(CompiledRule {
                rule: Arc::clone(rule),
                ports,
            });
            rule_index.insert(rule.id, position);
            pairs.entry((src, dst)).or_default().push(position);
        }

        // BTreeMap order gives (source, target) ascending, so each list is
        // already sorted by target.
        let mut adjacency: Vec<Vec<Edge>> = vec![Vec::new(); segments.len()];
        for ((src, dst), rules) in pairs {
            if let Some(list) = adjacency.get_mut(src) {
                list.push(Edge { target: dst, rules });
            }
        }

        let graph = Self {
            version: 0,
            segments,
            index,
            rules: compiled,
            rule_index,
            adjacency,
            warnings,
        };

        debug!(
            segments = graph.segment_count(),
            rules = graph.rule_count(),
            edges = graph.edge_count(),
            skipped = graph.warnings.len(),
            "policy graph built"
        );

        graph
    }

    /// Build from the store's current contents, tagged with its version.
    pub fn from_store(store: &DataStore) -> Self {
        // Read the version first: a concurrent write then makes the graph
        // look older than it is, which only costs an extra rebuild.
        let version = store.version();
        let mut graph = Self::build(&store.segments_snapshot(), &store.rules_snapshot());
        graph.version = version;
        graph
    }

    // ── Introspection ────────────────────────────────────────────────

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Number of rules that made it into the graph.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum()
    }

    pub fn warnings(&self) -> &[DataWarning] {
        &self.warnings
    }

    pub fn segments(&self) -> &[Arc<Segment>] {
        &self.segments
    }

    pub fn segment(&self, id: SegmentId) -> Option<&Arc<Segment>> {
        self.index.get(&id).and_then(|&i| self.segments.get(i))
    }

    pub fn rule(&self, id: RuleId) -> Option<&Arc<Rule>> {
        self.rule_index
            .get(&id)
            .and_then(|&i| self.rules.get(i))
            .map(|c| &c.rule)
    }

    /// Rules on the edge `source -> destination`, sorted by rule id.
    /// Empty if there is no such edge.
    pub fn edge_rules(&self, source: SegmentId, destination: SegmentId) -> Vec<&Arc<Rule>> {
        let (Some(&src), Some(&dst)) = (self.index.get(&source), self.index.get(&destination))
        else {
            return Vec::new();
        };
        self.edges(src)
            .iter()
            .find(|e| e.target == dst)
            .map(|e| {
                e.rules
                    .iter()
                    .filter_map(|&r| self.compiled(r))
                    .map(|c| &c.rule)
                    .collect()
            })
            .unwrap_or_default()
    }

    // ── Crate-internal arena access ──────────────────────────────────

    pub(crate) fn node_index(&self, id: SegmentId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub(crate) fn node(&self, idx: usize) -> Option<&Arc<Segment>> {
        self.segments.get(idx)
    }

    pub(crate) fn edges(&self, idx: usize) -> &[Edge] {
        self.adjacency.get(idx).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn compiled(&self, idx: usize) -> Option<&CompiledRule> {
        self.rules.get(idx)
    }

    pub(crate) fn rule_position(&self, id: RuleId) -> Option<usize> {
        self.rule_index.get(&id).copied()
    }
}

// ── Test fixtures ──────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use crate::model::{
        FirewallId, Protocol, Rule, RuleAction, RuleId, Segment, SegmentId, ZoneType,
    };

    pub(crate) fn segment(id: u64, name: &str) -> Arc<Segment> {
        Arc::new(Segment {
            id: SegmentId(id),
            name: name.into(),
            ip_range: format!("10.0.{id}.0/24"),
            zone_type: ZoneType::Internal,
            color: "#4ECDC4".into(),
            description: None,
            created_at: None,
            updated_at: None,
        })
    }

    pub(crate) fn rule(
        id: u64,
        src: u64,
        dst: u64,
        protocol: Protocol,
        ports: Option<&str>,
        action: RuleAction,
    ) -> Arc<Rule> {
        Arc::new(Rule {
            id: RuleId(id),
            firewall_id: FirewallId(1),
            rule_name: format!("R{id}"),
            source_segment_id: SegmentId(src),
            destination_segment_id: SegmentId(dst),
            protocol,
            port_range: ports.map(str::to_owned),
            action,
            description: None,
            created_at: None,
            updated_at: None,
        })
    }

    pub(crate) fn allow(id: u64, src: u64, dst: u64, ports: &str) -> Arc<Rule> {
        rule(id, src, dst, Protocol::Tcp, Some(ports), RuleAction::Allow)
    }

    pub(crate) fn deny(id: u64, src: u64, dst: u64, ports: &str) -> Arc<Rule> {
        rule(id, src, dst, Protocol::Tcp, Some(ports), RuleAction::Deny)
    }

    /// A(1), B(2), C(3).
    pub(crate) fn abc() -> Vec<Arc<Segment>> {
        vec![segment(1, "A"), segment(2, "B"), segment(3, "C")]
    }
}

// ── Search ──
//
// Case-insensitive substring search over segments (name, ip_range) and
// rules (rule_name, description). In-memory only.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::model::{Rule, Segment};

/// Which entity kinds a search covers.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SearchKind {
    #[default]
    All,
    Segments,
    Rules,
}

/// The field a hit matched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SearchHit {
    Name,
    IpRange,
    RuleName,
    Description,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentMatch {
    pub segment: Segment,
    pub matched_on: SearchHit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMatch {
    pub rule: Rule,
    pub matched_on: SearchHit,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub segments: Vec<SegmentMatch>,
    pub rules: Vec<RuleMatch>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len() + self.rules.len()
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Run a search. A blank query returns nothing.
pub fn search(
    segments: &[Arc<Segment>],
    rules: &[Arc<Rule>],
    query: &str,
    kind: SearchKind,
) -> SearchResults {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return SearchResults::default();
    }

    let mut results = SearchResults::default();

    if kind != SearchKind::Rules {
        results.segments = segments
            .iter()
            .filter_map(|s| {
                let hit = if contains_ci(&s.name, &needle) {
                    SearchHit::Name
                } else if contains_ci(&s.ip_range, &needle) {
                    SearchHit::IpRange
                } else {
                    return None;
                };
                Some(SegmentMatch {
                    segment: (**s).clone(),
                    matched_on: hit,
                })
            })
            .collect();
    }

    if kind != SearchKind::Segments {
        results.rules = rules
            .iter()
            .filter_map(|r| {
                let hit = if contains_ci(&r.rule_name, &needle) {
                    SearchHit::RuleName
                } else if r
                    .description
                    .as_deref()
                    .is_some_and(|d| contains_ci(d, &needle))
                {
                    SearchHit::Description
                } else {
                    return None;
                };
                Some(RuleMatch {
                    rule: (**r).clone(),
                    matched_on: hit,
                })
            })
            .collect();
    }

    results
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::graph::fixtures::{abc, allow, segment};

    #[test]
    fn matches_name_case_insensitively() {
        let segments = vec![segment(1, "DMZ Web"), segment(2, "Core")];
        let results = search(&segments, &[], "dmz", SearchKind::All);
        assert_eq!(results.segments.len(), 1);
        assert_eq!(results.segments[0].matched_on, SearchHit::Name);
    }

    #[test]
    fn matches_ip_range() {
        let results = search(&abc(), &[], "10.0.2.", SearchKind::Segments);
        assert_eq!(results.segments.len(), 1);
        assert_eq!(results.segments[0].segment.name, "B");
        assert_eq!(results.segments[0].matched_on, SearchHit::IpRange);
    }

    #[test]
    fn rules_match_on_description() {
        let mut rule = (*allow(1, 1, 2, "443")).clone();
        rule.description = Some("HTTPS to payment gateway".into());
        let rules = vec![Arc::new(rule)];

        let results = search(&abc(), &rules, "PAYMENT", SearchKind::All);
        assert!(results.segments.is_empty());
        assert_eq!(results.rules[0].matched_on, SearchHit::Description);
    }

    #[test]
    fn kind_restricts_results() {
        let rules = vec![allow(1, 1, 2, "443")];
        // "1" hits every ip_range and the rule name "R1".
        let all = search(&abc(), &rules, "1", SearchKind::All);
        assert!(!all.segments.is_empty());
        assert!(!all.rules.is_empty());

        let only_rules = search(&abc(), &rules, "1", SearchKind::Rules);
        assert!(only_rules.segments.is_empty());
        assert_eq!(only_rules.len(), 1);
    }

    #[test]
    fn blank_query_returns_nothing() {
        assert!(search(&abc(), &[allow(1, 1, 2, "443")], "  ", SearchKind::All).is_empty());
    }

    #[test]
    fn kind_parses_from_cli_strings() {
        assert_eq!("Segments".parse::<SearchKind>().unwrap(), SearchKind::Segments);
        assert_eq!(SearchKind::Rules.to_string(), "rules");
    }
}

// ── Rule matching ──
//
// Port-range grammar:
//   spec  := item ("," item)*
//   item  := port | port "-" port        (inclusive, start <= end)
//   port  := [0-9]+                      (0..=65535)
// Whitespace is allowed around items and around "-". An absent or blank
// spec means "any port". Malformed specs never match.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::model::{Protocol, Rule};

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortSpecError {
    #[error("empty port entry at position {position}")]
    EmptyItem { position: usize },

    #[error("'{token}' is not a port number")]
    InvalidNumber { token: String },

    #[error("port {value} is out of range (0-65535)")]
    OutOfRange { value: String },

    #[error("range {start}-{end} has start greater than end")]
    Reversed { start: u16, end: u16 },
}

// ── PortRange ──────────────────────────────────────────────────────

/// One inclusive range. A single port is `start == end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn contains(self, port: u16) -> bool {
        self.start <= port && port <= self.end
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

fn parse_port(token: &str) -> Result<u16, PortSpecError> {
    let token = token.trim();
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PortSpecError::InvalidNumber {
            token: token.to_owned(),
        });
    }
    token.parse::<u16>().map_err(|_| PortSpecError::OutOfRange {
        value: token.to_owned(),
    })
}

// ── PortSpec ───────────────────────────────────────────────────────

/// A parsed, non-empty `port_range` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    ranges: Vec<PortRange>,
}

impl PortSpec {
    pub fn contains(&self, port: u16) -> bool {
        self.ranges.iter().any(|r| r.contains(port))
    }

    /// Ranges in the order they were written.
    pub fn ranges(&self) -> &[PortRange] {
        &self.ranges
    }
}

impl FromStr for PortSpec {
    type Err = PortSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut ranges = Vec::new();

        for (position, item) in s.split(',').enumerate() {
            let item = item.trim();
            if item.is_empty() {
                return Err(PortSpecError::EmptyItem { position });
            }

            let range = match item.split_once('-') {
                Some((start, end)) => {
                    let start = parse_port(start)?;
                    let end = parse_port(end)?;
                    if start > end {
                        return Err(PortSpecError::Reversed { start, end });
                    }
                    PortRange { start, end }
                }
                None => {
                    let port = parse_port(item)?;
                    PortRange {
                        start: port,
                        end: port,
                    }
                }
            };
            ranges.push(range);
        }

        Ok(Self { ranges })
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{range}")?;
        }
        Ok(())
    }
}

// ── PortFilter ─────────────────────────────────────────────────────

/// A rule's port constraint after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortFilter {
    Any,
    Ports(PortSpec),
}

impl PortFilter {
    /// Parse a rule's optional `port_range`. Blank counts as absent.
    pub fn parse(raw: Option<&str>) -> Result<Self, PortSpecError> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(Self::Any),
            Some(spec) => spec.parse().map(Self::Ports),
        }
    }

    /// Query port `None` passes every filter.
    pub fn admits(&self, port: Option<u16>) -> bool {
        match (self, port) {
            (Self::Any, _) | (_, None) => true,
            (Self::Ports(spec), Some(port)) => spec.contains(port),
        }
    }
}

// ── Protocol test ──────────────────────────────────────────────────

/// Query protocol `None` or `ANY` passes; a rule for `ANY` matches every
/// protocol; otherwise the protocols must be equal.
pub fn protocol_matches(rule_protocol: Protocol, query: Option<Protocol>) -> bool {
    match query {
        None | Some(Protocol::Any) => true,
        Some(q) => rule_protocol == Protocol::Any || rule_protocol == q,
    }
}

/// Whether `rule` applies to the given traffic. Never panics; a rule with
/// a malformed port range matches nothing.
pub fn matches(rule: &Rule, protocol: Option<Protocol>, port: Option<u16>) -> bool {
    if !protocol_matches(rule.protocol, protocol) {
        return false;
    }
    match PortFilter::parse(rule.port_range.as_deref()) {
        Ok(filter) => filter.admits(port),
        Err(_) => false,
    }
}

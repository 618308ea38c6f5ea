// ── Identity types ──
//
// Segments, rules and firewalls are keyed by the backend's integer
// primary keys. Each gets its own newtype so a rule id can never be
// passed where a segment id is expected.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

integer_id!(
    /// Primary key of a network segment.
    SegmentId
);

integer_id!(
    /// Primary key of a firewall rule.
    RuleId
);

integer_id!(
    /// Primary key of a firewall (enforcement point).
    FirewallId
);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_whitespace() {
        assert_eq!(" 42 ".parse::<SegmentId>().unwrap(), SegmentId(42));
        assert!("abc".parse::<RuleId>().is_err());
    }

    #[test]
    fn serializes_as_bare_integer() {
        let json = serde_json::to_string(&RuleId(7)).unwrap();
        assert_eq!(json, "7");
        let back: RuleId = serde_json::from_str("7").unwrap();
        assert_eq!(back, RuleId(7));
    }

    #[test]
    fn ordering_follows_numeric_value() {
        let mut ids = vec![SegmentId(10), SegmentId(2), SegmentId(7)];
        ids.sort();
        assert_eq!(ids, vec![SegmentId(2), SegmentId(7), SegmentId(10)]);
    }
}

// fwgraph-core: Policy graph and reachability engine between fwgraph-api and the CLI.

pub mod command;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod graph;
pub mod model;
pub mod search;
pub mod source;
pub mod store;
pub mod topology;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::requests::*;
pub use command::{Command, CommandResult, ImportReport};
pub use config::{EngineConfig, RetryPolicy};
pub use engine::Engine;
pub use error::CoreError;
pub use graph::impact::{
    AffectedConnection, AffectedConnectionWire, DependentPath, ImpactLimits, ImpactReport,
    ImpactStatus, ImpactedRule, RuleImpactResponse, SegmentRef, TraversingPath,
};
pub use graph::matcher::{PortSpec, PortSpecError};
pub use graph::path::{AppliedRule, PathHop, PathQuery, PathResult};
pub use graph::{DataWarning, PolicyGraph};
pub use search::{RuleMatch, SearchHit, SearchKind, SearchResults, SegmentMatch};
pub use source::{PolicySnapshot, PolicySource, SnapshotFormat};
pub use store::DataStore;
pub use topology::{EdgeMetadata, TopologyEdge, TopologyFilter, TopologyNode, TopologyView};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Firewall, FirewallId, Protocol, Rule, RuleAction, RuleId, Segment, SegmentId, ZoneType,
};

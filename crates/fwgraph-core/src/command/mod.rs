// ── Command API ──
//
// All write operations flow through a unified `Command` enum. The engine
// routes each variant by source: forwarded to the REST backend, or
// validated against the store and (for snapshot files) written back.

pub mod import;
pub mod requests;

use crate::model::{Rule, RuleId, Segment, SegmentId};

pub use import::ImportReport;
pub use requests::{
    CreateRuleRequest, CreateSegmentRequest, UpdateRuleRequest, UpdateSegmentRequest,
};

/// All possible write operations against the policy model.
#[derive(Debug, Clone)]
pub enum Command {
    // ── Segment operations ───────────────────────────────────────────
    CreateSegment(CreateSegmentRequest),
    UpdateSegment {
        id: SegmentId,
        update: UpdateSegmentRequest,
    },
    DeleteSegment {
        id: SegmentId,
    },
    /// Create one segment per CSV row; bad rows are skipped and reported.
    ImportSegments {
        file_name: String,
        csv: String,
    },

    // ── Rule operations ──────────────────────────────────────────────
    CreateRule(CreateRuleRequest),
    UpdateRule {
        id: RuleId,
        update: UpdateRuleRequest,
    },
    /// Deletes every listed rule that exists; unknown ids are skipped.
    DeleteRules {
        ids: Vec<RuleId>,
    },
}

impl Command {
    /// Short verb for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateSegment(_) => "create_segment",
            Self::UpdateSegment { .. } => "update_segment",
            Self::DeleteSegment { .. } => "delete_segment",
            Self::ImportSegments { .. } => "import_segments",
            Self::CreateRule(_) => "create_rule",
            Self::UpdateRule { .. } => "update_rule",
            Self::DeleteRules { .. } => "delete_rules",
        }
    }
}

/// Result of a successfully executed command.
#[derive(Debug, Clone)]
pub enum CommandResult {
    Ok,
    Segment(Segment),
    Rule(Rule),
    Deleted { count: usize },
    Imported(ImportReport),
}

//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::path::Path;

use serde::de::DeserializeOwned;

use fwgraph_core::{Engine, Protocol, RuleAction, SearchKind, SegmentId, ZoneType};

use crate::cli::{ActionArg, ProtocolArg, SearchTypeArg, ZoneArg};
use crate::error::CliError;

// ── Value enum conversions ──────────────────────────────────────────

impl From<ZoneArg> for ZoneType {
    fn from(zone: ZoneArg) -> Self {
        match zone {
            ZoneArg::Dmz => Self::Dmz,
            ZoneArg::Internal => Self::Internal,
            ZoneArg::External => Self::External,
            ZoneArg::Management => Self::Management,
        }
    }
}

impl From<ProtocolArg> for Protocol {
    fn from(protocol: ProtocolArg) -> Self {
        match protocol {
            ProtocolArg::Tcp => Self::Tcp,
            ProtocolArg::Udp => Self::Udp,
            ProtocolArg::Icmp => Self::Icmp,
            ProtocolArg::Any => Self::Any,
        }
    }
}

impl From<ActionArg> for RuleAction {
    fn from(action: ActionArg) -> Self {
        match action {
            ActionArg::Allow => Self::Allow,
            ActionArg::Deny => Self::Deny,
        }
    }
}

impl From<SearchTypeArg> for SearchKind {
    fn from(kind: SearchTypeArg) -> Self {
        match kind {
            SearchTypeArg::All => Self::All,
            SearchTypeArg::Segments => Self::Segments,
            SearchTypeArg::Rules => Self::Rules,
        }
    }
}

/// `-` for absent values in detail views.
pub fn or_dash<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".into(), |v| v.to_string())
}

// ── Lookups ─────────────────────────────────────────────────────────

/// Resolve a segment given by ID or name.
pub async fn resolve_segment_id(engine: &Engine, key: &str) -> Result<SegmentId, CliError> {
    Ok(engine.resolve_segment(key).await?.id)
}

// ── Interaction ─────────────────────────────────────────────────────

/// Prompt for confirmation, auto-approving if `--yes` was passed.
///
/// Without a terminal there is nobody to ask, so `--yes` is required.
pub fn confirm(action: &str, message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

// ── Files ───────────────────────────────────────────────────────────

/// Read a create payload for `--from-file`: JSON for `.json`, YAML otherwise.
pub fn read_payload<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let contents = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let parsed = if is_json {
        serde_json::from_str(&contents).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str(&contents).map_err(|e| e.to_string())
    };
    parsed.map_err(|reason| CliError::Validation {
        field: "from-file".into(),
        reason: format!("{}: {reason}", path.display()),
    })
}

/// Write an export to `out`, or to stdout when no path is given.
pub fn write_export(
    csv: &str,
    out: Option<&Path>,
    rows: usize,
    quiet: bool,
) -> Result<(), CliError> {
    match out {
        Some(path) => {
            std::fs::write(path, format!("{csv}\n"))?;
            if !quiet {
                eprintln!("Exported {rows} row(s) to {}", path.display());
            }
        }
        None => crate::output::print_output(csv, quiet),
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fwgraph_core::CreateSegmentRequest;

    use super::*;

    #[test]
    fn payload_reads_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();

        let yaml = dir.path().join("seg.yaml");
        std::fs::write(&yaml, "name: DMZ\nip_range: 10.0.1.0/24\nzone_type: DMZ\n").unwrap();
        let req: CreateSegmentRequest = read_payload(&yaml).unwrap();
        assert_eq!(req.zone_type, ZoneType::Dmz);

        let json = dir.path().join("seg.JSON");
        std::fs::write(
            &json,
            r#"{"name": "Core", "ip_range": "10.0.2.0/24", "zone_type": "internal"}"#,
        )
        .unwrap();
        let req: CreateSegmentRequest = read_payload(&json).unwrap();
        assert_eq!(req.name, "Core");
    }

    #[test]
    fn payload_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{").unwrap();
        let err = read_payload::<CreateSegmentRequest>(&bad).unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }

    #[test]
    fn confirm_with_yes_skips_prompt() {
        assert!(confirm("delete", "Delete?", true).unwrap());
    }
}

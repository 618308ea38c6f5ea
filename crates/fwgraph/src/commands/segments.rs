//! Segment command handlers.

use std::sync::Arc;

use tabled::Tabled;

use fwgraph_core::{
    Command as CoreCommand, CommandResult, CreateSegmentRequest, Engine, ImportReport, Segment,
    UpdateSegmentRequest, ZoneType,
};

use crate::cli::{GlobalOpts, SegmentsArgs, SegmentsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct SegmentRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "IP Range")]
    ip_range: String,
    #[tabled(rename = "Zone")]
    zone: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<&Arc<Segment>> for SegmentRow {
    fn from(s: &Arc<Segment>) -> Self {
        Self {
            id: s.id.to_string(),
            name: s.name.clone(),
            ip_range: s.ip_range.clone(),
            zone: s.zone_type.to_string(),
            description: s.description.clone().unwrap_or_default(),
        }
    }
}

/// Export columns: id, name, ip_range, zone_type, color, description.
#[derive(Tabled)]
struct SegmentCsvRow {
    id: String,
    name: String,
    ip_range: String,
    zone_type: String,
    color: String,
    description: String,
}

impl From<&Arc<Segment>> for SegmentCsvRow {
    fn from(s: &Arc<Segment>) -> Self {
        Self {
            id: s.id.to_string(),
            name: s.name.clone(),
            ip_range: s.ip_range.clone(),
            zone_type: s.zone_type.to_string(),
            color: s.color.clone(),
            description: s.description.clone().unwrap_or_default(),
        }
    }
}

fn detail(s: &Segment) -> String {
    [
        format!("ID:          {}", s.id),
        format!("Name:        {}", s.name),
        format!("IP Range:    {}", s.ip_range),
        format!("Zone:        {}", s.zone_type),
        format!("Color:       {}", s.color),
        format!("Description: {}", util::or_dash(s.description.as_deref())),
        format!("Created:     {}", util::or_dash(s.created_at)),
        format!("Updated:     {}", util::or_dash(s.updated_at)),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    engine: &Engine,
    args: SegmentsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        SegmentsCommand::List { zone } => {
            let zone = zone.map(ZoneType::from);
            let segments: Vec<Arc<Segment>> = engine
                .segments()
                .await?
                .iter()
                .filter(|s| zone.is_none_or(|z| s.zone_type == z))
                .cloned()
                .collect();
            let out = output::render_list(
                &global.output,
                &segments,
                |s| SegmentRow::from(s),
                |s| s.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SegmentsCommand::Get { segment } => {
            let segment = engine.resolve_segment(&segment).await?;
            let out = output::render_single(
                &global.output,
                segment.as_ref(),
                detail,
                |s| s.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SegmentsCommand::Create {
            from_file,
            name,
            ip_range,
            zone,
            color,
            description,
        } => {
            let req = if let Some(ref path) = from_file {
                util::read_payload::<CreateSegmentRequest>(path)?
            } else {
                let (Some(name), Some(ip_range), Some(zone)) = (name, ip_range, zone) else {
                    return Err(CliError::Validation {
                        field: "segment".into(),
                        reason: "--name, --ip-range and --zone are required".into(),
                    });
                };
                CreateSegmentRequest {
                    name,
                    ip_range,
                    zone_type: zone.into(),
                    color,
                    description,
                }
            };

            let result = engine.execute(CoreCommand::CreateSegment(req)).await?;
            report_segment(&result, "created", global)
        }

        SegmentsCommand::Update {
            segment,
            name,
            ip_range,
            zone,
            color,
            description,
        } => {
            let update = UpdateSegmentRequest {
                name,
                ip_range,
                zone_type: zone.map(ZoneType::from),
                color,
                description,
            };
            if update.is_empty() {
                return Err(CliError::Validation {
                    field: "update".into(),
                    reason: "nothing to change; pass at least one field flag".into(),
                });
            }

            let id = util::resolve_segment_id(engine, &segment).await?;
            let result = engine
                .execute(CoreCommand::UpdateSegment { id, update })
                .await?;
            report_segment(&result, "updated", global)
        }

        SegmentsCommand::Delete { segment } => {
            let target = engine.resolve_segment(&segment).await?;
            let prompt = format!("Delete segment {} ({})?", target.name, target.id);
            if !util::confirm("segments delete", &prompt, global.yes)? {
                return Ok(());
            }
            engine
                .execute(CoreCommand::DeleteSegment { id: target.id })
                .await?;
            if !global.quiet {
                eprintln!("Segment {} deleted", target.name);
            }
            Ok(())
        }

        SegmentsCommand::Import { file } => {
            let csv = std::fs::read_to_string(&file)?;
            let file_name = file
                .file_name()
                .map_or_else(|| "segments.csv".into(), |n| n.to_string_lossy().into_owned());
            let result = engine
                .execute(CoreCommand::ImportSegments { file_name, csv })
                .await?;
            if let CommandResult::Imported(report) = result {
                if !global.quiet {
                    for error in &report.errors {
                        eprintln!("skipped {error}");
                    }
                }
                let out = output::render_single(&global.output, &report, import_summary, |r| {
                    r.created.to_string()
                })?;
                output::print_output(&out, global.quiet);
            }
            Ok(())
        }

        SegmentsCommand::Export { out } => {
            let segments = engine.segments().await?;
            let rows: Vec<SegmentCsvRow> = segments.iter().map(SegmentCsvRow::from).collect();
            let csv = output::render_csv(&rows);
            util::write_export(&csv, out.as_deref(), rows.len(), global.quiet)
        }
    }
}

fn import_summary(report: &ImportReport) -> String {
    format!(
        "Imported {} segment(s), skipped {} row(s)",
        report.created,
        report.errors.len()
    )
}

fn report_segment(result: &CommandResult, verb: &str, global: &GlobalOpts) -> Result<(), CliError> {
    if let CommandResult::Segment(segment) = result {
        if !global.quiet {
            eprintln!("Segment {} {verb} (ID {})", segment.name, segment.id);
        }
        let out = output::render_single(&global.output, segment, detail, |s| s.id.to_string())?;
        output::print_output(&out, global.quiet);
    }
    Ok(())
}

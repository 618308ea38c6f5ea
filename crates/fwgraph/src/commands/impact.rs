//! `fwgraph impact`: what removing a rule would change.

use tabled::Tabled;

use fwgraph_core::{AffectedConnection, Engine, ImpactReport, ImpactStatus, RuleId, SegmentRef};

use crate::cli::{GlobalOpts, ImpactArgs, OutputFormat};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct AffectedRow {
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Destination")]
    destination: String,
    #[tabled(rename = "Traffic")]
    traffic: String,
    #[tabled(rename = "Effect")]
    effect: String,
    #[tabled(rename = "Current Path")]
    current: String,
    #[tabled(rename = "Path Without Rule")]
    without: String,
}

fn names(path: &[SegmentRef]) -> String {
    if path.is_empty() {
        return "-".into();
    }
    path.iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl From<&AffectedConnection> for AffectedRow {
    fn from(a: &AffectedConnection) -> Self {
        let (effect, without) = match &a.status {
            ImpactStatus::Blocked => ("blocked", "-".to_owned()),
            ImpactStatus::Rerouted { via } => ("rerouted", names(via)),
            ImpactStatus::Opened { via } => ("opened", names(via)),
        };
        Self {
            source: a.source.name.clone(),
            destination: a.destination.name.clone(),
            traffic: match a.port {
                Some(port) => format!("{}/{port}", a.protocol),
                None => a.protocol.to_string(),
            },
            effect: effect.into(),
            current: names(&a.current_path),
            without,
        }
    }
}

fn detail(report: &ImpactReport) -> String {
    let rule = &report.rule;
    let mut lines = vec![
        format!("Rule:      #{} {} ({})", rule.rule_id, rule.rule_name, rule.action),
        format!(
            "Edge:      {} -> {}  {} {}",
            rule.source.name,
            rule.destination.name,
            rule.protocol,
            rule.port_range.as_deref().unwrap_or("any")
        ),
        format!(
            "Analyzed:  {} segment(s), {} traffic probe(s)",
            report.segments_analyzed, report.probes
        ),
        format!(
            "Affected:  {} blocked, {} rerouted, {} opened",
            report.blocked_count(),
            report.rerouted_count(),
            report.opened_count()
        ),
        format!("Traverse:  {} current path(s) use this rule", report.traversing.len()),
        format!("Warning:   {}", report.warning),
    ];
    if !report.affected.is_empty() {
        let rows: Vec<AffectedRow> = report.affected.iter().map(AffectedRow::from).collect();
        lines.push(String::new());
        lines.push(output::render_table(&rows));
    }
    lines.join("\n")
}

pub async fn handle(engine: &Engine, args: ImpactArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let report = engine.analyze_impact(RuleId(args.rule)).await?;

    let out = match global.output {
        OutputFormat::Csv => {
            let rows: Vec<AffectedRow> = report.affected.iter().map(AffectedRow::from).collect();
            output::render_csv(&rows)
        }
        _ if args.detailed => output::render_single(&global.output, &report, detail, |r| {
            r.warning.clone()
        })?,
        _ => output::render_single(
            &global.output,
            &report.to_response(),
            |_| detail(&report),
            |r| r.warning.clone(),
        )?,
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

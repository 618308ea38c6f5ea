//! `fwgraph path`: reachability between two segments.

use owo_colors::OwoColorize;

use fwgraph_core::{Engine, PathQuery, PathResult};

use crate::cli::{GlobalOpts, PathArgs};
use crate::error::CliError;
use crate::output;

fn detail(result: &PathResult, color: bool) -> String {
    if !result.reachable {
        let verdict = "no";
        return if color {
            format!("Reachable: {}", verdict.red().bold())
        } else {
            format!("Reachable: {verdict}")
        };
    }

    let verdict = "yes";
    let hops: Vec<String> = result
        .path
        .iter()
        .map(|h| format!("{} ({})", h.segment_name, h.segment_id))
        .collect();

    let mut lines = vec![
        if color {
            format!("Reachable: {}", verdict.green().bold())
        } else {
            format!("Reachable: {verdict}")
        },
        format!("Path:      {}", hops.join(" -> ")),
        format!("Hops:      {}", result.path.len().saturating_sub(1)),
    ];
    if !result.rules_applied.is_empty() {
        lines.push("Rules:".into());
        for rule in &result.rules_applied {
            lines.push(format!(
                "  #{:<5} {:<24} {} {}",
                rule.rule_id,
                rule.rule_name,
                rule.protocol,
                rule.port_range.as_deref().unwrap_or("any")
            ));
        }
    }
    lines.join("\n")
}

pub async fn handle(engine: &Engine, args: PathArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let source = engine.resolve_segment(&args.source).await?;
    let destination = engine.resolve_segment(&args.destination).await?;

    let mut query = PathQuery::new(source.id, destination.id);
    if let Some(protocol) = args.protocol {
        query = query.with_protocol(protocol.into());
    }
    if let Some(port) = args.port {
        query = query.with_port(port);
    }

    let result = engine.find_path(query).await?;
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &result,
        |r| detail(r, color),
        |r| {
            r.path
                .iter()
                .map(|h| h.segment_id.to_string())
                .collect::<Vec<_>>()
                .join("\n")
        },
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

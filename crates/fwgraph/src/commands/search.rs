//! `fwgraph search`: substring search over segments and rules.

use tabled::Tabled;

use fwgraph_core::{Engine, SearchResults};

use crate::cli::{GlobalOpts, OutputFormat, SearchArgs};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct HitRow {
    #[tabled(rename = "Kind")]
    kind: &'static str,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Matched")]
    matched_on: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

fn rows(results: &SearchResults) -> Vec<HitRow> {
    let segments = results.segments.iter().map(|m| HitRow {
        kind: "segment",
        id: m.segment.id.to_string(),
        name: m.segment.name.clone(),
        matched_on: m.matched_on.to_string(),
        detail: m.segment.ip_range.clone(),
    });
    let rules = results.rules.iter().map(|m| HitRow {
        kind: "rule",
        id: m.rule.id.to_string(),
        name: m.rule.rule_name.clone(),
        matched_on: m.matched_on.to_string(),
        detail: m.rule.description.clone().unwrap_or_default(),
    });
    segments.chain(rules).collect()
}

pub async fn handle(engine: &Engine, args: SearchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let results = engine.search(&args.query, args.kind.into()).await?;

    let out = match global.output {
        OutputFormat::Table if results.is_empty() => {
            if !global.quiet {
                eprintln!("No matches for '{}'", args.query);
            }
            String::new()
        }
        OutputFormat::Table => output::render_table(&rows(&results)),
        OutputFormat::Csv => output::render_csv(&rows(&results)),
        _ => output::render_single(
            &global.output,
            &results,
            |r| output::render_table(&rows(r)),
            |r| {
                rows(r)
                    .into_iter()
                    .map(|h| format!("{}:{}", h.kind, h.id))
                    .collect::<Vec<_>>()
                    .join("\n")
            },
        )?,
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

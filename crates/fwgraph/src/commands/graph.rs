//! `fwgraph graph`: the merged segment topology.

use tabled::Tabled;

use fwgraph_core::{Engine, Protocol, TopologyEdge, TopologyFilter, TopologyNode, TopologyView, ZoneType};

use crate::cli::{GlobalOpts, GraphArgs, OutputFormat};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Segment")]
    label: String,
    #[tabled(rename = "IP Range")]
    ip_range: String,
    #[tabled(rename = "Zone")]
    zone: String,
}

impl From<&TopologyNode> for NodeRow {
    fn from(n: &TopologyNode) -> Self {
        Self {
            id: n.segment_id.to_string(),
            label: n.label.clone(),
            ip_range: n.ip_range.clone(),
            zone: n.zone_type.to_string(),
        }
    }
}

#[derive(Tabled)]
struct EdgeRow {
    #[tabled(rename = "Edge")]
    id: String,
    #[tabled(rename = "From")]
    source: String,
    #[tabled(rename = "To")]
    target: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Rules")]
    rules: String,
    #[tabled(rename = "Ports")]
    ports: String,
}

impl From<&TopologyEdge> for EdgeRow {
    fn from(e: &TopologyEdge) -> Self {
        Self {
            id: e.id.clone(),
            source: e.source.clone(),
            target: e.target.clone(),
            label: e.label.clone(),
            rules: e
                .metadata
                .rule_ids
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
            ports: e.metadata.ports.join(", "),
        }
    }
}

fn detail(view: &TopologyView) -> String {
    let nodes: Vec<NodeRow> = view.nodes.iter().map(NodeRow::from).collect();
    let edges: Vec<EdgeRow> = view.edges.iter().map(EdgeRow::from).collect();
    format!(
        "Segments ({})\n{}\n\nConnections ({})\n{}",
        nodes.len(),
        output::render_table(&nodes),
        edges.len(),
        output::render_table(&edges)
    )
}

pub async fn handle(engine: &Engine, args: GraphArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let filter = TopologyFilter {
        zone_types: args.zone.into_iter().map(ZoneType::from).collect(),
        protocols: args.protocol.into_iter().map(Protocol::from).collect(),
        action: args.action.map(Into::into),
    };
    let view = engine.topology(&filter).await?;

    let out = if matches!(global.output, OutputFormat::Csv) {
        let edges: Vec<EdgeRow> = view.edges.iter().map(EdgeRow::from).collect();
        output::render_csv(&edges)
    } else {
        output::render_single(&global.output, &view, detail, |v| {
            v.edges
                .iter()
                .map(|e| e.id.clone())
                .collect::<Vec<_>>()
                .join("\n")
        })?
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

//! Firewall (enforcement point) command handlers.

use std::sync::Arc;

use tabled::Tabled;

use fwgraph_core::{Engine, Firewall};

use crate::cli::{FirewallsArgs, FirewallsCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct FirewallRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Vendor")]
    vendor: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Management IP")]
    management_ip: String,
    #[tabled(rename = "Rules")]
    rules: usize,
}

pub async fn handle(
    engine: &Engine,
    args: FirewallsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        FirewallsCommand::List => {
            let firewalls = engine.firewalls().await?;
            let rules = engine.rules().await?;

            let row = |f: &Arc<Firewall>| FirewallRow {
                id: f.id.to_string(),
                name: f.name.clone(),
                vendor: f.vendor.clone().unwrap_or_default(),
                model: f.model.clone().unwrap_or_default(),
                management_ip: f.management_ip.clone().unwrap_or_default(),
                rules: rules.iter().filter(|r| r.firewall_id == f.id).count(),
            };
            let out = output::render_list(&global.output, firewalls.as_slice(), row, |f| {
                f.id.to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

//! Firewall rule command handlers.

use std::sync::Arc;

use tabled::Tabled;

use fwgraph_core::{
    Command as CoreCommand, CommandResult, CreateRuleRequest, Engine, FirewallId, Protocol, Rule,
    RuleAction, RuleId, SegmentId, UpdateRuleRequest,
};

use crate::cli::{GlobalOpts, RuleListArgs, RulesArgs, RulesCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "FW")]
    firewall: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Destination")]
    destination: String,
    #[tabled(rename = "Proto")]
    protocol: String,
    #[tabled(rename = "Ports")]
    ports: String,
    #[tabled(rename = "Action")]
    action: String,
}

impl From<&Arc<Rule>> for RuleRow {
    fn from(r: &Arc<Rule>) -> Self {
        Self {
            id: r.id.to_string(),
            name: r.rule_name.clone(),
            firewall: r.firewall_id.to_string(),
            source: r.source_segment_id.to_string(),
            destination: r.destination_segment_id.to_string(),
            protocol: r.protocol.to_string(),
            ports: r.port_range().unwrap_or("any").to_owned(),
            action: r.action.to_string(),
        }
    }
}

/// Export columns match the backend's CSV export.
#[derive(Tabled)]
struct RuleCsvRow {
    id: String,
    firewall_id: String,
    rule_name: String,
    source_segment_id: String,
    destination_segment_id: String,
    protocol: String,
    port_range: String,
    action: String,
    description: String,
}

impl From<&Arc<Rule>> for RuleCsvRow {
    fn from(r: &Arc<Rule>) -> Self {
        Self {
            id: r.id.to_string(),
            firewall_id: r.firewall_id.to_string(),
            rule_name: r.rule_name.clone(),
            source_segment_id: r.source_segment_id.to_string(),
            destination_segment_id: r.destination_segment_id.to_string(),
            protocol: r.protocol.to_string(),
            port_range: r.port_range.clone().unwrap_or_default(),
            action: r.action.to_string(),
            description: r.description.clone().unwrap_or_default(),
        }
    }
}

fn detail(r: &Rule) -> String {
    [
        format!("ID:          {}", r.id),
        format!("Name:        {}", r.rule_name),
        format!("Firewall:    {}", r.firewall_id),
        format!("Source:      {}", r.source_segment_id),
        format!("Destination: {}", r.destination_segment_id),
        format!("Protocol:    {}", r.protocol),
        format!("Ports:       {}", r.port_range().unwrap_or("any")),
        format!("Action:      {}", r.action),
        format!("Description: {}", util::or_dash(r.description.as_deref())),
        format!("Created:     {}", util::or_dash(r.created_at)),
        format!("Updated:     {}", util::or_dash(r.updated_at)),
    ]
    .join("\n")
}

// ── Filtering ───────────────────────────────────────────────────────

struct RuleFilter {
    firewall: Option<FirewallId>,
    source: Option<SegmentId>,
    destination: Option<SegmentId>,
    protocol: Option<Protocol>,
    action: Option<RuleAction>,
}

impl RuleFilter {
    async fn resolve(engine: &Engine, args: &RuleListArgs) -> Result<Self, CliError> {
        let source = match args.source {
            Some(ref key) => Some(util::resolve_segment_id(engine, key).await?),
            None => None,
        };
        let destination = match args.destination {
            Some(ref key) => Some(util::resolve_segment_id(engine, key).await?),
            None => None,
        };
        Ok(Self {
            firewall: args.firewall.map(FirewallId),
            source,
            destination,
            protocol: args.protocol.map(Protocol::from),
            action: args.action.map(RuleAction::from),
        })
    }

    fn keeps(&self, rule: &Rule) -> bool {
        self.firewall.is_none_or(|f| rule.firewall_id == f)
            && self.source.is_none_or(|s| rule.source_segment_id == s)
            && self.destination.is_none_or(|d| rule.destination_segment_id == d)
            && self.protocol.is_none_or(|p| rule.protocol == p)
            && self.action.is_none_or(|a| rule.action == a)
    }
}

// ── Handler ─────────────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
pub async fn handle(
    engine: &Engine,
    args: RulesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        RulesCommand::List(list) => {
            let filter = RuleFilter::resolve(engine, &list).await?;
            let rules: Vec<Arc<Rule>> = engine
                .rules()
                .await?
                .iter()
                .filter(|r| filter.keeps(r))
                .cloned()
                .collect();
            let out =
                output::render_list(&global.output, &rules, |r| RuleRow::from(r), |r| r.id.to_string())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RulesCommand::Get { id } => {
            let rule = engine.rule(RuleId(id)).await?;
            let out = output::render_single(&global.output, rule.as_ref(), detail, |r| {
                r.id.to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RulesCommand::Create {
            from_file,
            name,
            firewall,
            source,
            destination,
            protocol,
            ports,
            action,
            description,
        } => {
            let req = if let Some(ref path) = from_file {
                util::read_payload::<CreateRuleRequest>(path)?
            } else {
                let (
                    Some(name),
                    Some(firewall),
                    Some(source),
                    Some(destination),
                    Some(protocol),
                    Some(action),
                ) = (name, firewall, source, destination, protocol, action)
                else {
                    return Err(CliError::Validation {
                        field: "rule".into(),
                        reason: "--name, --firewall, --source, --destination, --protocol \
                                 and --action are required"
                            .into(),
                    });
                };
                CreateRuleRequest {
                    firewall_id: FirewallId(firewall),
                    rule_name: name,
                    source_segment_id: util::resolve_segment_id(engine, &source).await?,
                    destination_segment_id: util::resolve_segment_id(engine, &destination)
                        .await?,
                    protocol: protocol.into(),
                    port_range: ports,
                    action: action.into(),
                    description,
                }
            };

            let result = engine.execute(CoreCommand::CreateRule(req)).await?;
            report_rule(&result, "created", global)
        }

        RulesCommand::Update {
            id,
            name,
            firewall,
            source,
            destination,
            protocol,
            ports,
            action,
            description,
        } => {
            let source_segment_id = match source {
                Some(ref key) => Some(util::resolve_segment_id(engine, key).await?),
                None => None,
            };
            let destination_segment_id = match destination {
                Some(ref key) => Some(util::resolve_segment_id(engine, key).await?),
                None => None,
            };
            let update = UpdateRuleRequest {
                firewall_id: firewall.map(FirewallId),
                rule_name: name,
                source_segment_id,
                destination_segment_id,
                protocol: protocol.map(Protocol::from),
                port_range: ports,
                action: action.map(RuleAction::from),
                description,
            };
            if update.is_empty() {
                return Err(CliError::Validation {
                    field: "update".into(),
                    reason: "nothing to change; pass at least one field flag".into(),
                });
            }

            let result = engine
                .execute(CoreCommand::UpdateRule {
                    id: RuleId(id),
                    update,
                })
                .await?;
            report_rule(&result, "updated", global)
        }

        RulesCommand::Delete { ids } => {
            let prompt = if ids.len() == 1 {
                format!("Delete rule {}?", ids[0])
            } else {
                format!("Delete {} rules?", ids.len())
            };
            if !util::confirm("rules delete", &prompt, global.yes)? {
                return Ok(());
            }

            let requested = ids.len();
            let result = engine
                .execute(CoreCommand::DeleteRules {
                    ids: ids.into_iter().map(RuleId).collect(),
                })
                .await?;
            if let CommandResult::Deleted { count } = result {
                if !global.quiet {
                    eprintln!("Deleted {count} of {requested} rule(s)");
                }
            }
            Ok(())
        }

        RulesCommand::Export { out } => {
            let rules = engine.rules().await?;
            let rows: Vec<RuleCsvRow> = rules.iter().map(RuleCsvRow::from).collect();
            let csv = output::render_csv(&rows);
            util::write_export(&csv, out.as_deref(), rows.len(), global.quiet)
        }
    }
}

fn report_rule(result: &CommandResult, verb: &str, global: &GlobalOpts) -> Result<(), CliError> {
    if let CommandResult::Rule(rule) = result {
        if !global.quiet {
            eprintln!("Rule {} {verb} (ID {})", rule.rule_name, rule.id);
        }
        let out = output::render_single(&global.output, rule, detail, |r| r.id.to_string())?;
        output::print_output(&out, global.quiet);
    }
    Ok(())
}

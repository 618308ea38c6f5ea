//! Command dispatch: bridges CLI args -> engine queries/Commands -> output formatting.

pub mod config_cmd;
pub mod firewalls;
pub mod graph;
pub mod impact;
pub mod path;
pub mod rules;
pub mod search;
pub mod segments;
pub mod util;

use fwgraph_core::Engine;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a source-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, engine: &Engine, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Segments(args) => segments::handle(engine, args, global).await,
        Command::Rules(args) => rules::handle(engine, args, global).await,
        Command::Firewalls(args) => firewalls::handle(engine, args, global).await,
        Command::Path(args) => path::handle(engine, args, global).await,
        Command::Impact(args) => impact::handle(engine, args, global).await,
        Command::Graph(args) => graph::handle(engine, args, global).await,
        Command::Search(args) => search::handle(engine, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "config and completions do not need a policy source".into(),
        )),
    }
}

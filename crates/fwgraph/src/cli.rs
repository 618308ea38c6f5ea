//! Clap derive structures for the `fwgraph` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.
//! Only clap types appear here so `build.rs` can compile it for man pages.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fwgraph -- reachability and rule impact analysis for firewall policies
#[derive(Debug, Parser)]
#[command(
    name = "fwgraph",
    version,
    about = "Analyze network segment reachability and firewall rule impact",
    long_about = "Query which segments can reach each other through a firewall policy,\n\
        and what breaks when a rule is removed.\n\n\
        Policies are read from a REST backend (--api-url) or a local\n\
        JSON, YAML or TOML snapshot file (--file).",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration profile to use
    #[arg(long, short = 'p', env = "FWGRAPH_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Backend base URL (overrides profile)
    #[arg(long, env = "FWGRAPH_API_URL", global = true, conflicts_with = "file")]
    pub api_url: Option<String>,

    /// Policy snapshot file: .json, .yaml, .yml or .toml (overrides profile)
    #[arg(long, short = 'f', env = "FWGRAPH_FILE", global = true)]
    pub file: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "FWGRAPH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "FWGRAPH_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "FWGRAPH_TIMEOUT", default_value = "30", global = true)]
    pub timeout: u64,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
    /// Comma-separated values with a header row
    Csv,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Domain value enums ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ZoneArg {
    Dmz,
    Internal,
    External,
    Management,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProtocolArg {
    Tcp,
    Udp,
    Icmp,
    Any,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ActionArg {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum SearchTypeArg {
    #[default]
    All,
    Segments,
    Rules,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage network segments
    #[command(alias = "seg", alias = "s")]
    Segments(SegmentsArgs),

    /// Manage firewall rules
    #[command(alias = "r")]
    Rules(RulesArgs),

    /// View firewalls (enforcement points)
    #[command(alias = "fw")]
    Firewalls(FirewallsArgs),

    /// Find a permitted path between two segments
    Path(PathArgs),

    /// Show what breaks if a rule is removed
    Impact(ImpactArgs),

    /// Show the segment topology graph
    Graph(GraphArgs),

    /// Search segments and rules by name, IP range or description
    Search(SearchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SEGMENTS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SegmentsArgs {
    #[command(subcommand)]
    pub command: SegmentsCommand,
}

#[derive(Debug, Subcommand)]
pub enum SegmentsCommand {
    /// List segments
    #[command(alias = "ls")]
    List {
        /// Only segments in this zone
        #[arg(long, short = 'z', ignore_case = true)]
        zone: Option<ZoneArg>,
    },

    /// Get segment details
    Get {
        /// Segment ID or name
        segment: String,
    },

    /// Create a segment
    Create {
        /// Read the segment from a JSON or YAML file
        #[arg(long, conflicts_with_all = ["name", "ip_range", "zone"])]
        from_file: Option<PathBuf>,

        /// Segment name (unique)
        #[arg(long, required_unless_present = "from_file")]
        name: Option<String>,

        /// CIDR, e.g. 10.0.1.0/24
        #[arg(long, required_unless_present = "from_file")]
        ip_range: Option<String>,

        /// Security zone
        #[arg(long, short = 'z', required_unless_present = "from_file", ignore_case = true)]
        zone: Option<ZoneArg>,

        /// Display color, e.g. #4ECDC4
        #[arg(long)]
        color: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Update a segment
    Update {
        /// Segment ID or name
        segment: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        ip_range: Option<String>,

        #[arg(long, short = 'z', ignore_case = true)]
        zone: Option<ZoneArg>,

        #[arg(long)]
        color: Option<String>,

        /// New description (empty string clears it)
        #[arg(long)]
        description: Option<String>,
    },

    /// Delete a segment (fails while rules reference it)
    #[command(alias = "rm")]
    Delete {
        /// Segment ID or name
        segment: String,
    },

    /// Import segments from a CSV file (name, ip_range, zone_type,
    /// color, description); rows that fail validation are skipped
    Import {
        /// CSV file with a header row
        file: PathBuf,
    },

    /// Export all segments as CSV
    Export {
        /// Write to a file instead of stdout
        #[arg(long, short = 'O')]
        out: Option<PathBuf>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  RULES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommand,
}

/// Filters for `rules list`.
#[derive(Debug, Args)]
pub struct RuleListArgs {
    /// Only rules enforced by this firewall ID
    #[arg(long)]
    pub firewall: Option<u64>,

    /// Only rules from this segment (ID or name)
    #[arg(long)]
    pub source: Option<String>,

    /// Only rules to this segment (ID or name)
    #[arg(long)]
    pub destination: Option<String>,

    #[arg(long, ignore_case = true)]
    pub protocol: Option<ProtocolArg>,

    #[arg(long, ignore_case = true)]
    pub action: Option<ActionArg>,
}

#[derive(Debug, Subcommand)]
pub enum RulesCommand {
    /// List rules
    #[command(alias = "ls")]
    List(RuleListArgs),

    /// Get rule details
    Get {
        /// Rule ID
        id: u64,
    },

    /// Create a rule
    Create {
        /// Read the rule from a JSON or YAML file
        #[arg(
            long,
            conflicts_with_all = ["name", "firewall", "source", "destination", "protocol", "action"]
        )]
        from_file: Option<PathBuf>,

        /// Rule name
        #[arg(long, required_unless_present = "from_file")]
        name: Option<String>,

        /// Enforcing firewall ID
        #[arg(long, required_unless_present = "from_file")]
        firewall: Option<u64>,

        /// Source segment (ID or name)
        #[arg(long, required_unless_present = "from_file")]
        source: Option<String>,

        /// Destination segment (ID or name)
        #[arg(long, required_unless_present = "from_file")]
        destination: Option<String>,

        #[arg(long, required_unless_present = "from_file", ignore_case = true)]
        protocol: Option<ProtocolArg>,

        /// Ports, e.g. "443", "8000-9000" or "80,443"
        #[arg(long)]
        ports: Option<String>,

        #[arg(long, required_unless_present = "from_file", ignore_case = true)]
        action: Option<ActionArg>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Update a rule
    Update {
        /// Rule ID
        id: u64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        firewall: Option<u64>,

        /// Source segment (ID or name)
        #[arg(long)]
        source: Option<String>,

        /// Destination segment (ID or name)
        #[arg(long)]
        destination: Option<String>,

        #[arg(long, ignore_case = true)]
        protocol: Option<ProtocolArg>,

        /// New ports (empty string means all ports)
        #[arg(long)]
        ports: Option<String>,

        #[arg(long, ignore_case = true)]
        action: Option<ActionArg>,

        /// New description (empty string clears it)
        #[arg(long)]
        description: Option<String>,
    },

    /// Delete one or more rules
    #[command(alias = "rm")]
    Delete {
        /// Rule IDs
        #[arg(required = true, num_args = 1..)]
        ids: Vec<u64>,
    },

    /// Export all rules as CSV
    Export {
        /// Write to a file instead of stdout
        #[arg(long, short = 'O')]
        out: Option<PathBuf>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  FIREWALLS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct FirewallsArgs {
    #[command(subcommand)]
    pub command: FirewallsCommand,
}

#[derive(Debug, Subcommand)]
pub enum FirewallsCommand {
    /// List firewalls
    #[command(alias = "ls")]
    List,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  ANALYSIS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct PathArgs {
    /// Source segment (ID or name)
    pub source: String,

    /// Destination segment (ID or name)
    pub destination: String,

    /// Traffic protocol (omit or ANY for any protocol)
    #[arg(long, short = 'P', ignore_case = true)]
    pub protocol: Option<ProtocolArg>,

    /// Destination port
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Debug, Args)]
pub struct ImpactArgs {
    /// Rule ID
    pub rule: u64,

    /// Emit the full report (probes, current paths, traversing paths)
    /// instead of the summary in structured output
    #[arg(long)]
    pub detailed: bool,
}

#[derive(Debug, Args)]
pub struct GraphArgs {
    /// Only segments in these zones (repeatable)
    #[arg(long, short = 'z', ignore_case = true)]
    pub zone: Vec<ZoneArg>,

    /// Only rules with these protocols (repeatable)
    #[arg(long, short = 'P', ignore_case = true)]
    pub protocol: Vec<ProtocolArg>,

    /// Only rules with this action
    #[arg(long, ignore_case = true)]
    pub action: Option<ActionArg>,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Case-insensitive text to look for
    pub query: String,

    /// Restrict the search to segments or rules
    #[arg(long = "type", short = 't', default_value = "all")]
    pub kind: SearchTypeArg,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG & COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive configuration wizard
    Init,

    /// Show the effective configuration
    Show,

    /// Print the config file path
    Path,

    /// Set a profile value (api_url, file, ca_cert, insecure, timeout)
    Set {
        key: String,
        value: String,
    },

    /// List profiles
    Profiles,

    /// Make a profile the default
    Use {
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use fwgraph_config::ConfigError;
use fwgraph_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Policy source ────────────────────────────────────────────────
    #[error("Policy source unavailable: {message}")]
    #[diagnostic(
        code(fwgraph::source_unavailable),
        help(
            "Check that the backend is running, or that the snapshot file is readable.\n\
             Retries and timeouts are tuned in the [engine] table: fwgraph config show"
        )
    )]
    SourceUnavailable { message: String },

    #[error("API error: {message}")]
    #[diagnostic(code(fwgraph::api_error))]
    ApiError { status: Option<u16>, message: String },

    #[error("Could not read or write {path}: {message}")]
    #[diagnostic(code(fwgraph::snapshot_io))]
    SnapshotIo { path: String, message: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(fwgraph::not_found),
        help("Run: fwgraph {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Conflict: {message}")]
    #[diagnostic(code(fwgraph::conflict))]
    Conflict { message: String },

    #[error("Data integrity violation: {message}")]
    #[diagnostic(
        code(fwgraph::data_integrity),
        help("Every rule must reference existing segments, and ids must be unique.")
    )]
    DataIntegrity { message: String },

    // ── Analysis limits ──────────────────────────────────────────────
    #[error("Impact analysis refused: {segments} segments exceeds the limit of {limit}")]
    #[diagnostic(
        code(fwgraph::scale_limit),
        help("Raise engine.max_impact_segments in the config file if this is intended.")
    )]
    ScaleLimit { segments: usize, limit: usize },

    #[error("Query timed out after {timeout_ms}ms")]
    #[diagnostic(
        code(fwgraph::timeout),
        help("Increase engine.query_timeout_ms (0 disables the deadline).")
    )]
    Timeout { timeout_ms: u64 },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(fwgraph::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(fwgraph::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: fwgraph config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No policy source configured")]
    #[diagnostic(
        code(fwgraph::no_config),
        help(
            "Pass --file <snapshot> or --api-url <url>, or create a profile with: fwgraph config init\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Profile '{profile}' has no policy source")]
    #[diagnostic(
        code(fwgraph::no_source),
        help("Set one with: fwgraph config set api_url <url>  (or: file <path>)")
    )]
    NoSource { profile: String },

    #[error(transparent)]
    #[diagnostic(code(fwgraph::config))]
    Config(Box<figment::Error>),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(fwgraph::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(fwgraph::render))]
    Render(String),

    #[error("Internal error: {0}")]
    #[diagnostic(code(fwgraph::internal))]
    Internal(String),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::SourceUnavailable { .. } | Self::ApiError { status: None, .. } => {
                exit_code::CONNECTION
            }
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } | Self::DataIntegrity { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::NonInteractiveRequiresYes { .. }
            | Self::NoConfig { .. }
            | Self::NoSource { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound {
                entity_type,
                identifier,
            } => CliError::NotFound {
                list_command: format!("{entity_type}s list"),
                resource_type: entity_type,
                identifier,
            },

            CoreError::DataIntegrity { message } => CliError::DataIntegrity { message },

            CoreError::TransientStore { message } => CliError::SourceUnavailable { message },

            CoreError::StoreUnavailable { attempts, message } => CliError::SourceUnavailable {
                message: format!("{message} (gave up after {attempts} attempt(s))"),
            },

            CoreError::ScaleLimitExceeded { segments, limit } => {
                CliError::ScaleLimit { segments, limit }
            }

            CoreError::Timeout { timeout_ms } => CliError::Timeout { timeout_ms },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Conflict { message } => CliError::Conflict { message },

            CoreError::Api { message, status } => CliError::ApiError {
                message: match status {
                    Some(code) => format!("{message} (HTTP {code})"),
                    None => message,
                },
                status,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "configuration".into(),
                reason: message,
            },

            CoreError::Io { path, message } => CliError::SnapshotIo { path, message },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoSource { profile } => CliError::NoSource { profile },
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
            ConfigError::Serialization(e) => CliError::Validation {
                field: "config".into(),
                reason: format!("failed to serialize config: {e}"),
            },
        }
    }
}

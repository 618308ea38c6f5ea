// ── Core error types ──
//
// User-facing errors from fwgraph-core. Consumers never see HTTP status
// codes or JSON parse failures directly: `From<fwgraph_api::Error>`
// translates transport-layer errors into domain variants.
//
// "Unreachable" is a successful query result and never an error.
// Rules with dangling endpoints or malformed port ranges are dropped at
// graph build time and reported as `graph::DataWarning`, not as errors.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Lookup errors ────────────────────────────────────────────────
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    // ── Store errors ─────────────────────────────────────────────────
    /// A write would leave the store inconsistent (dangling reference,
    /// duplicate id).
    #[error("Data integrity violation: {message}")]
    DataIntegrity { message: String },

    /// A single read of the policy source failed but may succeed later.
    #[error("Policy source temporarily unavailable: {message}")]
    TransientStore { message: String },

    /// The policy source could not be read after every retry.
    #[error("Policy source unavailable after {attempts} attempt(s): {message}")]
    StoreUnavailable { attempts: u32, message: String },

    // ── Query limits ─────────────────────────────────────────────────
    #[error(
        "Impact analysis refused: {segments} segments exceeds the configured limit of {limit}"
    )]
    ScaleLimitExceeded { segments: usize, limit: usize },

    #[error("Query exceeded its deadline of {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Write errors ─────────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    /// The write conflicts with existing data (duplicate name,
    /// segment still referenced by rules).
    #[error("Conflict: {message}")]
    Conflict { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration / IO ───────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(entity_type: &str, identifier: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_owned(),
            identifier: identifier.to_string(),
        }
    }

    /// Whether a retry of the same source read might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientStore { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<fwgraph_api::Error> for CoreError {
    fn from(err: fwgraph_api::Error) -> Self {
        if err.is_transient() {
            return CoreError::TransientStore {
                message: err.to_string(),
            };
        }

        match err {
            fwgraph_api::Error::Api { status, message } => match status {
                404 => CoreError::NotFound {
                    entity_type: "resource".into(),
                    identifier: message,
                },
                400 | 422 => CoreError::ValidationFailed { message },
                409 => CoreError::Conflict { message },
                _ => CoreError::Api {
                    message,
                    status: Some(status),
                },
            },
            fwgraph_api::Error::Transport(ref e) => CoreError::Api {
                message: e.to_string(),
                status: e.status().map(|s| s.as_u16()),
            },
            fwgraph_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            fwgraph_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS error: {msg}"),
            },
            fwgraph_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

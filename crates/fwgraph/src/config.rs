//! CLI configuration: thin wrapper around `fwgraph_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--file, --api-url, --insecure).

use fwgraph_config::{ProfileTarget, open_source, parse_api_url, transport_config};
use fwgraph_core::{EngineConfig, PolicySource};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use fwgraph_config::{
    Config, Profile, config_path, load_config_or_default, save_config,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Comma-separated profile names, sorted, for help text.
pub fn available_profiles(config: &Config) -> String {
    let mut names: Vec<_> = config.profiles.keys().cloned().collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort();
    names.join(", ")
}

/// Pick the policy source: `--file` > `--api-url` > profile.
pub fn resolve_source(global: &GlobalOpts, config: &Config) -> Result<PolicySource, CliError> {
    let profile_name = active_profile_name(global, config);
    let profile = config.profiles.get(&profile_name);

    // CLI flags win over the profile, but TLS settings still come from it.
    let ca_cert = profile.and_then(|p| p.ca_cert.as_deref());
    let insecure = global.insecure
        || profile
            .and_then(|p| p.insecure)
            .unwrap_or(config.defaults.insecure);
    let transport = transport_config(insecure, ca_cert, global.timeout);

    let target = if let Some(ref path) = global.file {
        ProfileTarget::File(path.clone())
    } else if let Some(ref raw) = global.api_url {
        ProfileTarget::Api(parse_api_url(raw)?)
    } else if let Some(profile) = profile {
        profile.target(&profile_name)?
    } else if global.profile.is_some() {
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: available_profiles(config),
        });
    } else {
        return Err(CliError::NoConfig {
            path: config_path().display().to_string(),
        });
    };

    tracing::debug!(profile = %profile_name, ?target, "resolved policy source");
    Ok(open_source(target, &transport)?)
}

/// Engine tuning from the `[engine]` table.
pub fn engine_config(config: &Config) -> Result<EngineConfig, CliError> {
    Ok(config.engine.to_engine_config()?)
}

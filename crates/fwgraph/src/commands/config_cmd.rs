//! Config subcommand handlers.

use std::fmt::Write;
use std::path::PathBuf;

use dialoguer::{Input, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// TOML-like rendering of the effective configuration.
fn format_config(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
        let _ = writeln!(out);
    }
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "insecure = {}", cfg.defaults.insecure);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    let e = &cfg.engine;
    let _ = writeln!(out);
    let _ = writeln!(out, "[engine]");
    let _ = writeln!(out, "max_impact_segments = {}", e.max_impact_segments);
    let _ = writeln!(out, "query_timeout_ms = {}", e.query_timeout_ms);
    let _ = writeln!(out, "retry_attempts = {}", e.retry_attempts);
    let _ = writeln!(out, "retry_initial_backoff_ms = {}", e.retry_initial_backoff_ms);
    let _ = writeln!(out, "retry_max_backoff_ms = {}", e.retry_max_backoff_ms);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        if let Some(ref url) = p.api_url {
            let _ = writeln!(out, "api_url = \"{url}\"");
        }
        if let Some(ref file) = p.file {
            let _ = writeln!(out, "file = \"{}\"", file.display());
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
    }

    out.trim_end().to_owned()
}

fn save_config(cfg: &Config) -> Result<PathBuf, CliError> {
    Ok(config::save_config(cfg)?)
}

/// Map a dialoguer failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn parse_flag<T: std::str::FromStr>(field: &str, value: &str, expect: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("must be {expect}"),
    })
}

/// Apply `key = value` to a profile. A profile has exactly one source, so
/// setting `api_url` clears `file` and the reverse.
fn apply_setting(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    match key {
        "api_url" | "api-url" => {
            fwgraph_config::parse_api_url(&value)?;
            profile.api_url = Some(value);
            profile.file = None;
        }
        "file" => {
            profile.file = Some(value.into());
            profile.api_url = None;
        }
        "ca_cert" | "ca-cert" => profile.ca_cert = Some(value.into()),
        "insecure" => profile.insecure = Some(parse_flag("insecure", &value, "'true' or 'false'")?),
        "timeout" => profile.timeout = Some(parse_flag("timeout", &value, "a number (seconds)")?),
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!(
                    "unknown config key '{other}'. Valid keys: api_url, file, ca_cert, \
                     insecure, timeout"
                ),
            });
        }
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            eprintln!("fwgraph configuration wizard");
            eprintln!("   Config path: {}\n", config_path.display());

            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default("default".into())
                .interact_text()
                .map_err(prompt_err)?;

            let choices = &["fwgraph API server", "Policy snapshot file (JSON/YAML)"];
            let selection = Select::new()
                .with_prompt("Policy source")
                .items(choices)
                .default(0)
                .interact()
                .map_err(prompt_err)?;

            let mut profile = Profile::default();
            if selection == 0 {
                let url: String = Input::new()
                    .with_prompt("API URL")
                    .default("http://localhost:8000".into())
                    .interact_text()
                    .map_err(prompt_err)?;
                apply_setting(&mut profile, "api_url", url)?;
            } else {
                let file: String = Input::new()
                    .with_prompt("Snapshot path")
                    .interact_text()
                    .map_err(prompt_err)?;
                apply_setting(&mut profile, "file", file)?;
            }

            let mut cfg = config::load_config_or_default();
            cfg.profiles.insert(profile_name.clone(), profile);
            cfg.default_profile = Some(profile_name.clone());
            let written = save_config(&cfg)?;

            eprintln!("\n✓ Configuration written to {}", written.display());
            eprintln!("  Active profile: {profile_name}");
            eprintln!("\n  Test it: fwgraph segments list");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let out = output::render_single(&global.output, &cfg, format_config, |_| {
                "config".into()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        // ── Set <key> <value> ───────────────────────────────────────
        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.entry(profile_name.clone()).or_default();
            apply_setting(profile, &key, value)?;

            if cfg.default_profile.is_none() {
                cfg.default_profile = Some(profile_name.clone());
            }
            save_config(&cfg)?;
            eprintln!("✓ Set {key} on profile '{profile_name}'");
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: fwgraph config init");
            } else {
                let mut names: Vec<_> = cfg.profiles.keys().collect();
                names.sort();
                for name in names {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    name,
                    available: config::available_profiles(&cfg),
                });
            }

            cfg.default_profile = Some(name.clone());
            save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn api_url_and_file_are_exclusive() {
        let mut profile = Profile::default();
        apply_setting(&mut profile, "file", "policy.json".into()).unwrap();
        apply_setting(&mut profile, "api_url", "https://fw.example.com".into()).unwrap();
        assert!(profile.file.is_none());
        assert_eq!(profile.api_url.as_deref(), Some("https://fw.example.com"));

        apply_setting(&mut profile, "file", "policy.yaml".into()).unwrap();
        assert!(profile.api_url.is_none());
    }

    #[test]
    fn rejects_bad_values() {
        let mut profile = Profile::default();
        assert!(apply_setting(&mut profile, "timeout", "soon".into()).is_err());
        assert!(apply_setting(&mut profile, "api_url", "ftp://x".into()).is_err());
        assert!(apply_setting(&mut profile, "controller", "x".into()).is_err());
    }

    #[test]
    fn formats_profiles() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "lab".into(),
            Profile {
                file: Some("lab.json".into()),
                ..Profile::default()
            },
        );
        let text = format_config(&cfg);
        assert!(text.contains("[profiles.lab]"));
        assert!(text.contains("file = \"lab.json\""));
        assert!(text.contains("[engine]"));
    }
}

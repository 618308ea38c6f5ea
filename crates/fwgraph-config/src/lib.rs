//! Shared configuration for fwgraph.
//!
//! TOML profiles merged with `FWGRAPH_`-prefixed environment variables,
//! and translation to `fwgraph_core::{EngineConfig, PolicySource}`. The
//! CLI layers its `GlobalOpts` overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fwgraph_api::{ApiClient, TlsMode, TransportConfig};
use fwgraph_core::{EngineConfig, PolicySource, RetryPolicy};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' has no policy source (set api_url or file)")]
    NoSource { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Engine tuning shared by every profile.
    #[serde(default)]
    pub engine: EngineSettings,

    /// Named policy-source profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            engine: EngineSettings::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

/// The `[engine]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineSettings {
    /// Largest segment count impact analysis accepts.
    #[serde(default = "default_max_impact_segments")]
    pub max_impact_segments: usize,

    /// Per-query deadline in milliseconds. `0` disables it.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// Source read attempts, including the first.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_initial_backoff_ms")]
    pub retry_initial_backoff_ms: u64,

    #[serde(default = "default_retry_max_backoff_ms")]
    pub retry_max_backoff_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_impact_segments: default_max_impact_segments(),
            query_timeout_ms: default_query_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            retry_initial_backoff_ms: default_retry_initial_backoff_ms(),
            retry_max_backoff_ms: default_retry_max_backoff_ms(),
        }
    }
}

fn default_max_impact_segments() -> usize {
    500
}
fn default_query_timeout_ms() -> u64 {
    10_000
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_initial_backoff_ms() -> u64 {
    200
}
fn default_retry_max_backoff_ms() -> u64 {
    5_000
}

impl EngineSettings {
    /// Validate and translate to the core's runtime config.
    pub fn to_engine_config(&self) -> Result<EngineConfig, ConfigError> {
        if self.retry_attempts == 0 {
            return Err(ConfigError::Validation {
                field: "engine.retry_attempts".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.max_impact_segments == 0 {
            return Err(ConfigError::Validation {
                field: "engine.max_impact_segments".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.retry_initial_backoff_ms > self.retry_max_backoff_ms {
            return Err(ConfigError::Validation {
                field: "engine.retry_initial_backoff_ms".into(),
                reason: format!(
                    "{} exceeds retry_max_backoff_ms ({})",
                    self.retry_initial_backoff_ms, self.retry_max_backoff_ms
                ),
            });
        }

        Ok(EngineConfig {
            max_impact_segments: self.max_impact_segments,
            query_timeout: (self.query_timeout_ms > 0)
                .then(|| Duration::from_millis(self.query_timeout_ms)),
            retry: RetryPolicy {
                attempts: self.retry_attempts,
                initial_backoff: Duration::from_millis(self.retry_initial_backoff_ms),
                max_backoff: Duration::from_millis(self.retry_max_backoff_ms),
            },
        })
    }
}

/// A named policy-source profile: either a REST backend or a snapshot file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Backend base URL (e.g., "http://localhost:8000").
    pub api_url: Option<String>,

    /// Local snapshot file (.json, .yaml, .yml or .toml).
    pub file: Option<PathBuf>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,
}

/// Where a profile reads its policy from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileTarget {
    Api(url::Url),
    File(PathBuf),
}

impl Profile {
    /// Resolve the profile's policy source. Exactly one of `api_url` and
    /// `file` must be set.
    pub fn target(&self, profile_name: &str) -> Result<ProfileTarget, ConfigError> {
        match (&self.api_url, &self.file) {
            (Some(_), Some(_)) => Err(ConfigError::Validation {
                field: format!("profiles.{profile_name}"),
                reason: "set either api_url or file, not both".into(),
            }),
            (Some(raw), None) => parse_api_url(raw).map(ProfileTarget::Api),
            (None, Some(path)) => Ok(ProfileTarget::File(path.clone())),
            (None, None) => Err(ConfigError::NoSource {
                profile: profile_name.into(),
            }),
        }
    }

    /// Transport settings for this profile, falling back to `defaults`.
    pub fn transport(&self, defaults: &Defaults) -> TransportConfig {
        transport_config(
            self.insecure.unwrap_or(defaults.insecure),
            self.ca_cert.as_deref(),
            self.timeout.unwrap_or(defaults.timeout),
        )
    }
}

/// Parse and validate a backend URL.
pub fn parse_api_url(raw: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: "api_url".into(),
        reason: format!("invalid URL: {raw}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: "api_url".into(),
            reason: format!("expected an http or https URL, got '{raw}'"),
        });
    }
    Ok(url)
}

/// Build a transport config. `insecure` wins over a custom CA.
pub fn transport_config(
    insecure: bool,
    ca_cert: Option<&Path>,
    timeout_secs: u64,
) -> TransportConfig {
    let tls = if insecure {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ca_path) = ca_cert {
        TlsMode::CustomCa(ca_path.to_path_buf())
    } else {
        TlsMode::System
    };

    TransportConfig {
        tls,
        timeout: Duration::from_secs(timeout_secs),
    }
}

/// Open the policy source a target points at.
pub fn open_source(
    target: ProfileTarget,
    transport: &TransportConfig,
) -> Result<PolicySource, ConfigError> {
    match target {
        ProfileTarget::Api(url) => ApiClient::new(url.as_str(), transport)
            .map(PolicySource::Api)
            .map_err(|e| ConfigError::Validation {
                field: "api_url".into(),
                reason: e.to_string(),
            }),
        ProfileTarget::File(path) => {
            PolicySource::file(path).map_err(|e| ConfigError::Validation {
                field: "file".into(),
                reason: e.to_string(),
            })
        }
    }
}

/// Build the `PolicySource` for a profile, no CLI flag overrides.
pub fn profile_to_source(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<PolicySource, ConfigError> {
    let target = profile.target(profile_name)?;
    open_source(target, &profile.transport(defaults))
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "fwgraph", "fwgraph").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("fwgraph");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from a specific file + environment.
///
/// Nested keys use a double underscore, so `FWGRAPH_ENGINE__QUERY_TIMEOUT_MS`
/// sets `engine.query_timeout_ms`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("FWGRAPH_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.output, "table");
        assert_eq!(cfg.engine, EngineSettings::default());
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn file_profiles_and_engine_table_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_profile = "lab"

[engine]
max_impact_segments = 50
query_timeout_ms = 0

[profiles.lab]
file = "/srv/policy.yaml"

[profiles.prod]
api_url = "https://fw.example.com"
timeout = 5
"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("lab"));
        assert_eq!(cfg.engine.max_impact_segments, 50);
        // Unset keys keep their defaults.
        assert_eq!(cfg.engine.retry_attempts, 3);

        let engine = cfg.engine.to_engine_config().unwrap();
        assert_eq!(engine.max_impact_segments, 50);
        assert_eq!(engine.query_timeout, None);

        assert_eq!(
            cfg.profiles["lab"].target("lab").unwrap(),
            ProfileTarget::File(PathBuf::from("/srv/policy.yaml"))
        );
        let prod = &cfg.profiles["prod"];
        assert!(matches!(prod.target("prod").unwrap(), ProfileTarget::Api(_)));
        assert_eq!(
            prod.transport(&cfg.defaults).timeout,
            Duration::from_secs(5)
        );
    }

    #[test]
    fn profile_needs_exactly_one_source() {
        let neither = Profile::default();
        assert!(matches!(
            neither.target("x"),
            Err(ConfigError::NoSource { .. })
        ));

        let both = Profile {
            api_url: Some("http://localhost:8000".into()),
            file: Some("policy.json".into()),
            ..Profile::default()
        };
        assert!(matches!(
            both.target("x"),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn api_url_must_be_http() {
        assert!(parse_api_url("http://localhost:8000").is_ok());
        assert!(parse_api_url("ftp://example.com").is_err());
        assert!(parse_api_url("not a url").is_err());
    }

    #[test]
    fn engine_settings_are_validated() {
        let zero_attempts = EngineSettings {
            retry_attempts: 0,
            ..EngineSettings::default()
        };
        assert!(zero_attempts.to_engine_config().is_err());

        let inverted = EngineSettings {
            retry_initial_backoff_ms: 10_000,
            retry_max_backoff_ms: 100,
            ..EngineSettings::default()
        };
        let err = inverted.to_engine_config().unwrap_err();
        assert!(err.to_string().contains("retry_max_backoff_ms"));

        let engine = EngineSettings::default().to_engine_config().unwrap();
        assert_eq!(engine.query_timeout, Some(Duration::from_secs(10)));
        assert_eq!(engine.retry.attempts, 3);
    }

    #[test]
    fn insecure_overrides_custom_ca() {
        let ca = Path::new("/etc/ca.pem");
        assert_eq!(
            transport_config(true, Some(ca), 30).tls,
            TlsMode::DangerAcceptInvalid
        );
        assert_eq!(
            transport_config(false, Some(ca), 30).tls,
            TlsMode::CustomCa(ca.to_path_buf())
        );
        assert_eq!(transport_config(false, None, 30).tls, TlsMode::System);
    }

    #[test]
    fn file_profile_opens_file_source() {
        let profile = Profile {
            file: Some("policy.yml".into()),
            ..Profile::default()
        };
        let source = profile_to_source(&profile, "lab", &Defaults::default()).unwrap();
        assert!(!source.is_api());

        let bad = Profile {
            file: Some("policy.txt".into()),
            ..Profile::default()
        };
        assert!(profile_to_source(&bad, "lab", &Defaults::default()).is_err());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.profiles.insert(
            "default".into(),
            Profile {
                api_url: Some("http://localhost:8000".into()),
                ..Profile::default()
            },
        );
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(
            loaded.profiles["default"].api_url.as_deref(),
            Some("http://localhost:8000")
        );
    }
}

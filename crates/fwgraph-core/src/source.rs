// ── Policy sources ──
//
// Where the engine reads segments, firewalls and rules from: the REST
// backend, a local snapshot file (JSON, YAML or TOML), or an in-memory
// snapshot. Every load returns a complete `PolicySnapshot`; the store
// replaces its contents wholesale.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use tracing::{debug, warn};

use fwgraph_api::ApiClient;

use crate::convert::convert_lossy;
use crate::error::CoreError;
use crate::model::{Firewall, Rule, Segment};

/// A complete copy of the policy model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub firewalls: Vec<Firewall>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

// ── Snapshot file formats ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SnapshotFormat {
    Json,
    #[strum(to_string = "yaml", serialize = "yml")]
    Yaml,
    Toml,
}

impl SnapshotFormat {
    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }

    fn decode(self, text: &str) -> Result<PolicySnapshot, String> {
        match self {
            Self::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
            Self::Toml => toml::from_str(text).map_err(|e| e.to_string()),
        }
    }

    fn encode(self, snapshot: &PolicySnapshot) -> Result<String, String> {
        match self {
            Self::Json => serde_json::to_string_pretty(snapshot).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::to_string(snapshot).map_err(|e| e.to_string()),
            Self::Toml => toml::to_string_pretty(snapshot).map_err(|e| e.to_string()),
        }
    }
}

// ── PolicySource ───────────────────────────────────────────────────

pub enum PolicySource {
    /// REST backend. Writes are forwarded to it.
    Api(ApiClient),
    /// Snapshot file. Writes are validated locally and written back.
    File { path: PathBuf, format: SnapshotFormat },
    /// Fixed in-memory data. Writes only touch the store.
    Static(PolicySnapshot),
}

impl fmt::Debug for PolicySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api(client) => f.debug_tuple("Api").field(&client.base_url().as_str()).finish(),
            Self::File { path, format } => f
                .debug_struct("File")
                .field("path", path)
                .field("format", format)
                .finish(),
            Self::Static(s) => f
                .debug_struct("Static")
                .field("segments", &s.segments.len())
                .field("rules", &s.rules.len())
                .finish(),
        }
    }
}

impl fmt::Display for PolicySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api(client) => write!(f, "{}", client.base_url()),
            Self::File { path, .. } => write!(f, "{}", path.display()),
            Self::Static(_) => f.write_str("in-memory snapshot"),
        }
    }
}

fn io_error(path: &Path, err: &std::io::Error) -> CoreError {
    match err.kind() {
        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut => {
            CoreError::TransientStore {
                message: format!("{}: {err}", path.display()),
            }
        }
        _ => CoreError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        },
    }
}

impl PolicySource {
    /// A file source with the format taken from the extension.
    pub fn file(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let format = SnapshotFormat::from_path(&path).ok_or_else(|| CoreError::Config {
            message: format!(
                "cannot infer snapshot format of '{}' (expected .json, .yaml, .yml or .toml)",
                path.display()
            ),
        })?;
        Ok(Self::File { path, format })
    }

    pub fn is_api(&self) -> bool {
        matches!(self, Self::Api(_))
    }

    /// Read the complete policy model. One attempt; retries are the
    /// engine's job.
    pub async fn load(&self) -> Result<PolicySnapshot, CoreError> {
        match self {
            Self::Api(client) => load_from_api(client).await,
            Self::File { path, format } => {
                let text = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| io_error(path, &e))?;
                let snapshot = format.decode(&text).map_err(|message| CoreError::Io {
                    path: path.display().to_string(),
                    message: format!("invalid {format} snapshot: {message}"),
                })?;
                debug!(
                    path = %path.display(),
                    segments = snapshot.segments.len(),
                    rules = snapshot.rules.len(),
                    "snapshot file loaded"
                );
                Ok(snapshot)
            }
            Self::Static(snapshot) => Ok(snapshot.clone()),
        }
    }

    /// Persist `snapshot` to a file source. No-op for other sources.
    ///
    /// Writes a sibling temp file and renames it over the original, so a
    /// failed write never leaves a truncated snapshot behind.
    pub(crate) async fn write_back(&self, snapshot: &PolicySnapshot) -> Result<(), CoreError> {
        let Self::File { path, format } = self else {
            return Ok(());
        };

        let text = format.encode(snapshot).map_err(|message| CoreError::Io {
            path: path.display().to_string(),
            message: format!("cannot encode {format} snapshot: {message}"),
        })?;

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, text)
            .await
            .map_err(|e| io_error(&tmp, &e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| io_error(path, &e))?;

        debug!(path = %path.display(), "snapshot file written");
        Ok(())
    }
}

async fn load_from_api(client: &ApiClient) -> Result<PolicySnapshot, CoreError> {
    let (segments_res, rules_res, firewalls_res) = tokio::join!(
        client.list_all_segments(),
        client.list_all_rules(),
        client.list_firewalls(),
    );

    // Segments and rules are required; firewalls are informational.
    let segments: Vec<Segment> = convert_lossy(segments_res?, "segment");
    let rules: Vec<Rule> = convert_lossy(rules_res?, "rule");
    let firewalls: Vec<Firewall> = match firewalls_res {
        Ok(raw) => raw.into_iter().map(Firewall::from).collect(),
        Err(e) => {
            warn!(error = %e, "firewall list unavailable (non-fatal)");
            Vec::new()
        }
    };

    debug!(
        segments = segments.len(),
        rules = rules.len(),
        firewalls = firewalls.len(),
        "policy loaded from API"
    );

    Ok(PolicySnapshot {
        segments,
        firewalls,
        rules,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::graph::fixtures::{abc, allow};
    use crate::model::{RuleId, SegmentId};

    fn sample() -> PolicySnapshot {
        PolicySnapshot {
            segments: abc().iter().map(|s| (**s).clone()).collect(),
            firewalls: Vec::new(),
            rules: vec![(*allow(1, 1, 2, "443")).clone()],
        }
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(
            SnapshotFormat::from_path(Path::new("policy.YML")),
            Some(SnapshotFormat::Yaml)
        );
        assert_eq!(
            SnapshotFormat::from_path(Path::new("a/b.toml")),
            Some(SnapshotFormat::Toml)
        );
        assert_eq!(SnapshotFormat::from_path(Path::new("policy.csv")), None);
        assert!(PolicySource::file("policy.txt").is_err());
    }

    #[tokio::test]
    async fn json_file_loads_with_lenient_enums() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("policy.json");
        std::fs::write(
            &file,
            r#"{
                "segments": [
                    {"id": 1, "name": "DMZ Zone", "ip_range": "10.0.1.0/24", "zone_type": "dmz"}
                ],
                "rules": [
                    {"id": 7, "firewall_id": 1, "rule_name": "web", "source_segment_id": 1,
                     "destination_segment_id": 1, "protocol": "tcp", "action": "allow"}
                ]
            }"#,
        )
        .unwrap();

        let snapshot = PolicySource::file(&file).unwrap().load().await.unwrap();
        assert_eq!(snapshot.segments[0].id, SegmentId(1));
        assert_eq!(snapshot.segments[0].color, "#95A5A6");
        assert_eq!(snapshot.rules[0].id, RuleId(7));
        assert!(snapshot.firewalls.is_empty());
    }

    #[tokio::test]
    async fn write_back_then_load_preserves_contents() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["p.json", "p.yaml", "p.toml"] {
            let source = PolicySource::file(dir.path().join(name)).unwrap();
            source.write_back(&sample()).await.unwrap();
            assert_eq!(source.load().await.unwrap(), sample(), "{name}");
        }
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let source = PolicySource::file("/nonexistent/fwgraph/policy.json").unwrap();
        let err = source.load().await.unwrap_err();
        assert!(matches!(err, CoreError::Io { .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn garbage_file_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.yaml");
        std::fs::write(&file, "segments: [ {id: oops").unwrap();
        let err = PolicySource::file(&file).unwrap().load().await.unwrap_err();
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[tokio::test]
    async fn api_load_tolerates_missing_firewalls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/network-segments/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 1, "name": "A", "ip_range": "10.0.1.0/24", "zone_type": "Internal",
                 "color": "#4ECDC4"},
                {"id": 2, "name": "Odd", "ip_range": "10.0.2.0/24", "zone_type": "Guest",
                 "color": "#4ECDC4"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/firewall-rules/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/firewalls/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client =
            ApiClient::new(&server.uri(), &fwgraph_api::TransportConfig::default()).unwrap();
        let snapshot = PolicySource::Api(client).load().await.unwrap();

        // The unknown zone type is skipped, not fatal.
        assert_eq!(snapshot.segments.len(), 1);
        assert!(snapshot.firewalls.is_empty());
    }
}

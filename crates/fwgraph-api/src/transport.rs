// HTTP transport settings for the policy backend.
//
// The backend is usually plain HTTP on a private network; when it sits
// behind a TLS proxy the operator may pin a CA or, for lab setups, skip
// verification entirely.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};

use crate::error::Error;

/// Connect timeout cap. A backend that cannot accept a TCP connection in
/// this long is treated as down, whatever the request timeout is.
const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How server certificates are checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// System trust roots.
    #[default]
    System,
    /// Trust an additional CA read from a PEM file.
    CustomCa(PathBuf),
    /// Skip verification.
    DangerAcceptInvalid,
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        self.timeout.min(MAX_CONNECT_TIMEOUT)
    }

    /// Build the shared `reqwest::Client`. Every request asks for JSON.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout())
            .user_agent(concat!("fwgraph/", env!("CARGO_PKG_VERSION")));

        let builder = match &self.tls {
            TlsMode::System => builder,
            TlsMode::CustomCa(path) => builder.add_root_certificate(load_ca(path)?),
            TlsMode::DangerAcceptInvalid => {
                tracing::warn!("TLS certificate verification is disabled");
                builder.danger_accept_invalid_certs(true)
            }
        };

        builder
            .build()
            .map_err(|e| Error::Tls(format!("cannot build HTTP client: {e}")))
    }
}

fn load_ca(path: &Path) -> Result<reqwest::Certificate, Error> {
    let pem = std::fs::read(path)
        .map_err(|e| Error::Tls(format!("cannot read CA certificate {}: {e}", path.display())))?;
    reqwest::Certificate::from_pem(&pem)
        .map_err(|e| Error::Tls(format!("{} is not a PEM certificate: {e}", path.display())))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn connect_timeout_is_capped() {
        let long = TransportConfig {
            timeout: Duration::from_secs(120),
            ..TransportConfig::default()
        };
        assert_eq!(long.connect_timeout(), MAX_CONNECT_TIMEOUT);

        let short = TransportConfig {
            timeout: Duration::from_secs(3),
            ..TransportConfig::default()
        };
        assert_eq!(short.connect_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn missing_ca_file_is_a_tls_error() {
        let config = TransportConfig {
            tls: TlsMode::CustomCa("/nonexistent/ca.pem".into()),
            ..TransportConfig::default()
        };
        let err = config.build_client().unwrap_err();
        assert!(matches!(err, Error::Tls(ref m) if m.contains("/nonexistent/ca.pem")));
    }
}

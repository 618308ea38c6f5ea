// Async HTTP client for the segment / firewall-rule REST backend.
//
// Base path: /api/
// Auth: none (the backend is expected to sit behind the operator's proxy)

use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::types;
use crate::{Error, TransportConfig};

// ── Error response shape (FastAPI) ───────────────────────────────────

/// `{"detail": "..."}` for HTTPException, `{"detail": [{"msg": ...}]}` for
/// request validation failures.
#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

fn detail_message(detail: &serde_json::Value) -> String {
    match detail {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| {
                item.get("msg")
                    .and_then(serde_json::Value::as_str)
                    .map_or_else(|| item.to_string(), str::to_owned)
            })
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the REST backend.
///
/// Communicates via JSON endpoints under `/api/`. List endpoints are
/// paginated with `skip`/`limit`; the `list_all_*` helpers walk every page.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from a base URL and transport config.
    pub fn new(base_url: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::from_reqwest(base_url, http)
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self { http, base_url })
    }

    /// Ensure the base URL ends with `/api/`.
    ///
    /// `http://host:8000` and `http://host:8000/api` both become
    /// `http://host:8000/api/`.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();

        if path.ends_with("/api") {
            url.set_path(&format!("{path}/"));
        } else {
            url.set_path(&format!("{path}/api/"));
        }

        Ok(url)
    }

    /// The normalized base URL (always ends with `/api/`).
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builder ──────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url} params={params:?}");

        let resp = self.http.get(url).query(params).send().await?;
        self.handle_response(resp).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.get_with_params(path, &[]).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let resp = self.http.post(url).json(body).send().await?;
        self.handle_response(resp).await
    }

    async fn put<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("PUT {url}");

        let resp = self.http.put(url).json(body).send().await?;
        self.handle_response(resp).await
    }

    async fn delete(&self, path: &str) -> Result<(), Error> {
        let url = self.url(path)?;
        debug!("DELETE {url}");

        let resp = self.http.delete(url).send().await?;
        self.handle_empty(resp).await
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                let preview: String = body.chars().take(200).collect();
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            })
        } else {
            Err(self.parse_error(status, resp).await)
        }
    }

    async fn handle_empty(&self, resp: reqwest::Response) -> Result<(), Error> {
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(self.parse_error(status, resp).await)
        }
    }

    async fn parse_error(&self, status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        let raw = resp.text().await.unwrap_or_default();

        let message = serde_json::from_str::<ErrorResponse>(&raw)
            .ok()
            .and_then(|err| err.detail)
            .map(|detail| detail_message(&detail))
            .unwrap_or_else(|| {
                if raw.is_empty() {
                    status.to_string()
                } else {
                    raw
                }
            });

        Error::Api {
            status: status.as_u16(),
            message,
        }
    }

    // ── Pagination helper ────────────────────────────────────────────

    /// Collect all pages into a single `Vec<T>`.
    ///
    /// The backend returns bare arrays, so a short page marks the end.
    pub async fn paginate_all<T, F, Fut>(&self, limit: u32, fetch: F) -> Result<Vec<T>, Error>
    where
        F: Fn(u64, u32) -> Fut,
        Fut: Future<Output = Result<Vec<T>, Error>>,
    {
        let limit = limit.clamp(1, types::MAX_PAGE_LIMIT);
        let mut all = Vec::new();
        let mut skip: u64 = 0;

        loop {
            let page = fetch(skip, limit).await?;
            let received = page.len();
            all.extend(page);

            if received < usize::try_from(limit).unwrap_or(usize::MAX) {
                break;
            }

            skip += u64::try_from(received).unwrap_or(u64::MAX);
        }

        Ok(all)
    }

    // ━━ Public API ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    // ── Network segments ─────────────────────────────────────────────

    pub async fn list_segments(
        &self,
        skip: u64,
        limit: u32,
        zone_type: Option<&str>,
    ) -> Result<Vec<types::SegmentResponse>, Error> {
        let mut params = vec![("skip", skip.to_string()), ("limit", limit.to_string())];
        if let Some(zone) = zone_type {
            params.push(("zone_type", zone.to_owned()));
        }
        self.get_with_params("network-segments/", &params).await
    }

    pub async fn list_all_segments(&self) -> Result<Vec<types::SegmentResponse>, Error> {
        self.paginate_all(types::MAX_PAGE_LIMIT, |skip, limit| {
            self.list_segments(skip, limit, None)
        })
        .await
    }

    pub async fn get_segment(&self, id: u64) -> Result<types::SegmentResponse, Error> {
        self.get(&format!("network-segments/{id}")).await
    }

    pub async fn create_segment(
        &self,
        body: &types::SegmentCreateUpdate,
    ) -> Result<types::SegmentResponse, Error> {
        self.post("network-segments/", body).await
    }

    pub async fn update_segment(
        &self,
        id: u64,
        body: &types::SegmentCreateUpdate,
    ) -> Result<types::SegmentResponse, Error> {
        self.put(&format!("network-segments/{id}"), body).await
    }

    pub async fn delete_segment(&self, id: u64) -> Result<(), Error> {
        self.delete(&format!("network-segments/{id}")).await
    }

    /// Upload a CSV file (`name,ip_range,zone_type[,color][,description]`)
    /// as the multipart field `file`.
    pub async fn import_segments_csv(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<types::CsvImportResponse, Error> {
        let url = self.url("network-segments/import/csv")?;
        debug!("POST {url} (multipart, {} bytes)", contents.len());

        let part = reqwest::multipart::Part::bytes(contents)
            .file_name(file_name.to_owned())
            .mime_str("text/csv")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self.http.post(url).multipart(form).send().await?;
        self.handle_response(resp).await
    }

    // ── Firewalls ────────────────────────────────────────────────────

    pub async fn list_firewalls(&self) -> Result<Vec<types::FirewallResponse>, Error> {
        self.get("firewalls/").await
    }

    // ── Firewall rules ───────────────────────────────────────────────

    pub async fn list_rules(
        &self,
        skip: u64,
        limit: u32,
        filter: &types::RuleListFilter,
    ) -> Result<Vec<types::RuleResponse>, Error> {
        let mut params = vec![("skip", skip.to_string()), ("limit", limit.to_string())];
        params.extend(filter.to_params());
        self.get_with_params("firewall-rules/", &params).await
    }

    pub async fn list_all_rules(&self) -> Result<Vec<types::RuleResponse>, Error> {
        let filter = types::RuleListFilter::default();
        self.paginate_all(types::MAX_PAGE_LIMIT, |skip, limit| {
            self.list_rules(skip, limit, &filter)
        })
        .await
    }

    pub async fn get_rule(&self, id: u64) -> Result<types::RuleResponse, Error> {
        self.get(&format!("firewall-rules/{id}")).await
    }

    pub async fn create_rule(
        &self,
        body: &types::RuleCreateUpdate,
    ) -> Result<types::RuleResponse, Error> {
        self.post("firewall-rules/", body).await
    }

    pub async fn update_rule(
        &self,
        id: u64,
        body: &types::RuleCreateUpdate,
    ) -> Result<types::RuleResponse, Error> {
        self.put(&format!("firewall-rules/{id}"), body).await
    }

    pub async fn delete_rule(&self, id: u64) -> Result<(), Error> {
        self.delete(&format!("firewall-rules/{id}")).await
    }

    pub async fn bulk_delete_rules(
        &self,
        ids: &[u64],
    ) -> Result<types::BulkDeleteResponse, Error> {
        let body = types::BulkDeleteRequest { ids: ids.to_vec() };
        self.post("firewall-rules/bulk-delete", &body).await
    }
}

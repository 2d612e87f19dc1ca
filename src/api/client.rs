//! HTTP client for the bee platform REST API.
//!
//! One `PlatformClient` per configured project. All requests carry the
//! bearer API key; error bodies are classified into `ApiError` variants so
//! callers can branch on rate limits and auth failures without string
//! matching, and any echoed secrets are redacted before surfacing.

use std::path::Path;
use std::time::Duration;

use regex::Regex;
use reqwest::multipart;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use crate::api::types::{
    ApiErrorBody, FilePurpose, FileRecord, ListPage, ListParams, VectorStore, VectorStoreFile,
    ERROR_CODE_TOO_MANY_REQUESTS,
};
use crate::config::ApiConfig;
use crate::error::ApiError;

/// Client for the platform REST API.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl PlatformClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key.expose_secret())
    }

    /// Upload a local file (`POST /files`).
    pub async fn upload_file(
        &self,
        path: &Path,
        purpose: FilePurpose,
        depends_on_thread_id: Option<&str>,
    ) -> Result<FileRecord, ApiError> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        let bytes = tokio::fs::read(path).await?;

        let file_part = multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str(mime.essence_str())
            .map_err(|e| ApiError::InvalidResponse {
                endpoint: "/files".to_string(),
                reason: format!("invalid mime type: {e}"),
            })?;

        let purpose_value =
            serde_json::to_value(purpose).map_err(ApiError::Json)?;
        let mut form = multipart::Form::new()
            .part("file", file_part)
            .text("purpose", purpose_value.as_str().unwrap_or("assistants").to_string());
        if let Some(thread_id) = depends_on_thread_id {
            form = form.text("depends_on_thread_id", thread_id.to_string());
        }

        let response = self
            .client
            .post(self.url("/files"))
            .header("Authorization", self.bearer())
            .multipart(form)
            .send()
            .await?;
        Self::decode(response, "/files").await
    }

    /// Attach an uploaded file to a vector store
    /// (`POST /vector_stores/{id}/files`).
    pub async fn attach_file(
        &self,
        vector_store_id: &str,
        file_id: &str,
    ) -> Result<VectorStoreFile, ApiError> {
        let endpoint = format!("/vector_stores/{vector_store_id}/files");
        let response = self
            .client
            .post(self.url(&endpoint))
            .header("Authorization", self.bearer())
            .json(&serde_json::json!({ "file_id": file_id }))
            .send()
            .await?;
        Self::decode(response, &endpoint).await
    }

    /// Create a vector store (`POST /vector_stores`).
    pub async fn create_vector_store(
        &self,
        name: &str,
        file_ids: &[String],
    ) -> Result<VectorStore, ApiError> {
        let response = self
            .client
            .post(self.url("/vector_stores"))
            .header("Authorization", self.bearer())
            .json(&serde_json::json!({ "name": name, "file_ids": file_ids }))
            .send()
            .await?;
        Self::decode(response, "/vector_stores").await
    }

    /// Fetch one vector store's detail (`GET /vector_stores/{id}`).
    pub async fn get_vector_store(&self, id: &str) -> Result<VectorStore, ApiError> {
        let endpoint = format!("/vector_stores/{id}");
        self.get(&endpoint).await
    }

    /// Fetch one attachment's detail
    /// (`GET /vector_stores/{vsId}/files/{fileId}`).
    pub async fn get_vector_store_file(
        &self,
        vector_store_id: &str,
        file_id: &str,
    ) -> Result<VectorStoreFile, ApiError> {
        let endpoint = format!("/vector_stores/{vector_store_id}/files/{file_id}");
        self.get(&endpoint).await
    }

    /// List vector stores (`GET /vector_stores`).
    pub async fn list_vector_stores(
        &self,
        params: &ListParams,
    ) -> Result<ListPage<VectorStore>, ApiError> {
        self.get(&with_query("/vector_stores", params)).await
    }

    /// List a vector store's files (`GET /vector_stores/{id}/files`).
    pub async fn list_vector_store_files(
        &self,
        vector_store_id: &str,
        params: &ListParams,
    ) -> Result<ListPage<VectorStoreFile>, ApiError> {
        let endpoint = format!("/vector_stores/{vector_store_id}/files");
        self.get(&with_query(&endpoint, params)).await
    }

    /// Detach a file from a vector store
    /// (`DELETE /vector_stores/{vsId}/files/{fileId}`).
    pub async fn delete_vector_store_file(
        &self,
        vector_store_id: &str,
        file_id: &str,
    ) -> Result<(), ApiError> {
        let endpoint = format!("/vector_stores/{vector_store_id}/files/{file_id}");
        let response = self
            .client
            .delete(self.url(&endpoint))
            .header("Authorization", self.bearer())
            .send()
            .await?;
        if response.status().is_success() {
            return Ok(());
        }
        Err(Self::classify_failure(response, &endpoint).await)
    }

    /// Resolve Python module names to installable packages
    /// (`POST /modules_to_packages`).
    pub async fn modules_to_packages(
        &self,
        modules: &[String],
    ) -> Result<Vec<String>, ApiError> {
        #[derive(serde::Deserialize)]
        struct Packages {
            packages: Vec<String>,
        }
        let response = self
            .client
            .post(self.url("/modules_to_packages"))
            .header("Authorization", self.bearer())
            .json(&serde_json::json!({ "modules": modules }))
            .send()
            .await?;
        let body: Packages = Self::decode(response, "/modules_to_packages").await?;
        Ok(body.packages)
    }

    /// Proxy a chat completion request (`POST /chat/completions`).
    ///
    /// The LLM payload is opaque to this client; the bridge relays it
    /// untouched for sandboxed apps that cannot call the API themselves.
    pub async fn chat_completion(
        &self,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError> {
        let response = self
            .client
            .post(self.url("/chat/completions"))
            .header("Authorization", self.bearer())
            .json(payload)
            .send()
            .await?;
        Self::decode(response, "/chat/completions").await
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        let response = self
            .client
            .get(self.url(endpoint))
            .header("Authorization", self.bearer())
            .send()
            .await?;
        Self::decode(response, endpoint).await
    }

    async fn decode<T: DeserializeOwned>(
        response: Response,
        endpoint: &str,
    ) -> Result<T, ApiError> {
        if !response.status().is_success() {
            return Err(Self::classify_failure(response, endpoint).await);
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }

    async fn classify_failure(response: Response, endpoint: &str) -> ApiError {
        let status = response.status();
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.unwrap_or_default();
        classify_status(status, retry_after, &body, endpoint)
    }
}

fn with_query(endpoint: &str, params: &ListParams) -> String {
    let query = params.to_query();
    if query.is_empty() {
        endpoint.to_string()
    } else {
        format!("{endpoint}?{query}")
    }
}

/// Map an HTTP failure status plus body into a typed error.
fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
    endpoint: &str,
) -> ApiError {
    let parsed: Option<ApiErrorBody> = serde_json::from_str(body).ok();
    let coded_rate_limit = parsed
        .as_ref()
        .is_some_and(|b| b.code == ERROR_CODE_TOO_MANY_REQUESTS);

    if status == StatusCode::TOO_MANY_REQUESTS || coded_rate_limit {
        return ApiError::RateLimited { retry_after };
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return ApiError::AuthFailed;
    }
    if status == StatusCode::NOT_FOUND {
        return ApiError::NotFound {
            resource: "resource".to_string(),
            id: endpoint.to_string(),
        };
    }

    let detail = parsed
        .map(|b| b.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.chars().take(200).collect());
    ApiError::RequestFailed {
        endpoint: endpoint.to_string(),
        reason: format!("HTTP {}: {}", status.as_u16(), redact_sensitive_detail(&detail)),
    }
}

/// Strip bearer tokens and API keys out of error text before it reaches logs
/// or the user.
pub fn redact_sensitive_detail(raw: &str) -> String {
    let mut value = raw.to_string();
    let patterns = [
        (r"(?i)\b(bearer)\s+[a-z0-9._\-~+/]+=*", "$1 [REDACTED]"),
        (
            r"(?i)\b(token|api[_\-]?key|secret|password)\b(\s*[:=]\s*)([^,\s]+)",
            "$1$2[REDACTED]",
        ),
        (r"(?i)\bsk-[a-z0-9\-]{10,}\b", "sk-[REDACTED]"),
    ];

    for (pattern, replacement) in patterns {
        if let Ok(re) = Regex::new(pattern) {
            value = re.replace_all(&value, replacement).to_string();
        }
    }

    value
}

//! Wire types for the bee platform REST API.
//!
//! Shapes mirror the remote API's JSON bodies. Statuses are closed enums so
//! downstream code matches exhaustively instead of probing fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing status of a server-side resource.
///
/// Anything other than `InProgress` is terminal: the poller drops the
/// resource and never re-fetches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl ResourceStatus {
    pub fn is_pending(self) -> bool {
        matches!(self, Self::InProgress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Why an uploaded file is stored (the API requires a purpose on upload).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilePurpose {
    Assistants,
    AssistantsOutput,
}

/// Server-side record of an uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub filename: String,
    pub purpose: FilePurpose,
    pub bytes: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on_thread_id: Option<String>,
}

/// Last processing error reported by the server for a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastError {
    pub code: String,
    pub message: String,
}

/// Counts of files in a vector store, by embedding state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCounts {
    pub total: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

/// A knowledge-base collection that embeds documents for retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStore {
    pub id: String,
    pub name: String,
    pub status: ResourceStatus,
    #[serde(default)]
    pub file_counts: FileCounts,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,
}

/// The association between an uploaded file and a vector store, carrying its
/// own embedding status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStoreFile {
    pub id: String,
    pub vector_store_id: String,
    pub status: ResourceStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPage<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_id: Option<String>,
}

/// Listing parameters (cursor pagination plus filter/sort).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub limit: Option<u32>,
    pub after: Option<String>,
    pub order: Option<SortOrder>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl ListParams {
    /// Canonical query-string rendering, also used as a cache key component.
    pub fn to_query(&self) -> String {
        let mut parts = Vec::new();
        if let Some(limit) = self.limit {
            parts.push(format!("limit={limit}"));
        }
        if let Some(after) = &self.after {
            parts.push(format!("after={after}"));
        }
        if let Some(order) = self.order {
            parts.push(format!("order={}", order.as_str()));
        }
        if let Some(search) = &self.search {
            parts.push(format!("search={search}"));
        }
        parts.join("&")
    }
}

/// Machine-readable error body returned by the platform.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Error code the platform uses for rate-limit rejections.
pub const ERROR_CODE_TOO_MANY_REQUESTS: &str = "too_many_requests";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_snake_case() {
        let parsed: ResourceStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(parsed, ResourceStatus::InProgress);
        assert!(parsed.is_pending());
        assert_eq!(
            serde_json::to_string(&ResourceStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
    }

    #[test]
    fn terminal_statuses_are_not_pending() {
        for status in [
            ResourceStatus::Completed,
            ResourceStatus::Failed,
            ResourceStatus::Cancelled,
        ] {
            assert!(!status.is_pending(), "{} must be terminal", status.as_str());
        }
    }

    #[test]
    fn list_params_render_canonical_query() {
        let params = ListParams {
            limit: Some(20),
            after: None,
            order: Some(SortOrder::Desc),
            search: Some("notes".to_string()),
        };
        assert_eq!(params.to_query(), "limit=20&order=desc&search=notes");
        assert_eq!(ListParams::default().to_query(), "");
    }

    #[test]
    fn vector_store_file_parses_with_optional_error() {
        let json = r#"{
            "id": "vsf_1",
            "vector_store_id": "vs_1",
            "status": "failed",
            "created_at": "2026-01-10T12:00:00Z",
            "last_error": {"code": "parse_error", "message": "unreadable file"}
        }"#;
        let file: VectorStoreFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.status, ResourceStatus::Failed);
        assert_eq!(file.last_error.unwrap().code, "parse_error");
    }
}

//! Platform REST API client: wire types, HTTP client, connectivity probe.

pub mod client;
pub mod health;
pub mod types;

pub use client::{redact_sensitive_detail, PlatformClient};
pub use health::{probe_api, ApiHealth, ApiHealthState};
pub use types::{
    ApiErrorBody, FileCounts, FilePurpose, FileRecord, LastError, ListPage, ListParams,
    ResourceStatus, SortOrder, VectorStore, VectorStoreFile, ERROR_CODE_TOO_MANY_REQUESTS,
};

//! In-memory query cache for listed and fetched resources.
//!
//! Pages are held behind `Arc` so an untouched page keeps its identity
//! across reconciliation passes; consumers can compare with `Arc::ptr_eq`
//! to skip re-rendering.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::api::types::{ListParams, VectorStore, VectorStoreFile};

/// A resource the cache can hold and the reconciler can patch.
pub trait CachedResource: Clone + PartialEq + Send + Sync + 'static {
    fn cache_id(&self) -> &str;

    /// Scope of the listing this resource appears in. All parameterizations
    /// of one scope share invalidation.
    fn list_scope(&self) -> String;
}

impl CachedResource for VectorStore {
    fn cache_id(&self) -> &str {
        &self.id
    }

    fn list_scope(&self) -> String {
        "vector_stores".to_string()
    }
}

impl CachedResource for VectorStoreFile {
    fn cache_id(&self) -> &str {
        &self.id
    }

    fn list_scope(&self) -> String {
        format!("vector_stores/{}/files", self.vector_store_id)
    }
}

/// Cache key for one parameterized listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListKey {
    pub scope: String,
    pub params: String,
}

impl ListKey {
    pub fn new(scope: impl Into<String>, params: &ListParams) -> Self {
        Self {
            scope: scope.into(),
            params: params.to_query(),
        }
    }
}

pub type PageRef<T> = Arc<Vec<T>>;

/// Pages and detail entries for one resource type.
#[derive(Debug)]
pub struct QueryCache<T> {
    pages: HashMap<ListKey, Vec<PageRef<T>>>,
    details: HashMap<String, Arc<T>>,
    stale_scopes: HashSet<String>,
}

impl<T: CachedResource> QueryCache<T> {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            details: HashMap::new(),
            stale_scopes: HashSet::new(),
        }
    }

    /// Store a fetched page under its listing key.
    pub fn push_page(&mut self, key: ListKey, page: Vec<T>) {
        self.pages.entry(key).or_default().push(Arc::new(page));
    }

    /// Replace every page under a listing key (a full refetch).
    pub fn set_pages(&mut self, key: ListKey, pages: Vec<Vec<T>>) {
        self.pages
            .insert(key, pages.into_iter().map(Arc::new).collect());
    }

    pub fn pages(&self, key: &ListKey) -> Option<&[PageRef<T>]> {
        self.pages.get(key).map(|p| p.as_slice())
    }

    pub fn keys_in_scope<'a>(&'a self, scope: &'a str) -> impl Iterator<Item = &'a ListKey> {
        self.pages.keys().filter(move |k| k.scope == scope)
    }

    pub fn detail(&self, id: &str) -> Option<Arc<T>> {
        self.details.get(id).cloned()
    }

    pub fn set_detail(&mut self, resource: T) {
        self.details
            .insert(resource.cache_id().to_string(), Arc::new(resource));
    }

    /// Mark every listing in a scope as needing a refetch.
    pub fn mark_stale(&mut self, scope: impl Into<String>) {
        self.stale_scopes.insert(scope.into());
    }

    pub fn is_stale(&self, scope: &str) -> bool {
        self.stale_scopes.contains(scope)
    }

    /// Drain the scopes whose listings should be refetched.
    pub fn take_stale(&mut self) -> Vec<String> {
        self.stale_scopes.drain().collect()
    }

    pub(crate) fn pages_mut(&mut self, key: &ListKey) -> Option<&mut Vec<PageRef<T>>> {
        self.pages.get_mut(key)
    }
}

impl<T: CachedResource> Default for QueryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

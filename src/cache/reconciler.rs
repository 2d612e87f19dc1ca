//! Applies polled status updates to cached pages in place.

use std::sync::Arc;

use crate::api::types::{VectorStore, VectorStoreFile};
use crate::poll::PendingSnapshot;

use super::store::{CachedResource, QueryCache};

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Pages rewritten because they contained the updated resource.
    pub patched_pages: usize,
    /// Whether the detail entry for the resource was refreshed.
    pub detail_updated: bool,
    /// Whether the resource's list scope was marked for refetch.
    pub invalidated: bool,
}

/// Patch a polled resource into every cached page that already contains it.
///
/// Only the pages holding the resource are rebuilt; untouched pages keep
/// their `Arc` identity. The pass never inserts into or removes from a
/// page, and it marks the scope stale so listings the patch could not see
/// (other filters, other components) refetch on their own schedule.
pub fn reconcile<T: CachedResource>(cache: &mut QueryCache<T>, updated: &T) -> ReconcileOutcome {
    let scope = updated.list_scope();
    let keys: Vec<_> = cache.keys_in_scope(&scope).cloned().collect();

    let mut outcome = ReconcileOutcome::default();
    for key in keys {
        let Some(pages) = cache.pages_mut(&key) else {
            continue;
        };
        for page in pages.iter_mut() {
            let position = page
                .iter()
                .position(|item| item.cache_id() == updated.cache_id());
            let Some(index) = position else { continue };
            if page[index] == *updated {
                continue;
            }
            let mut rebuilt = page.as_ref().clone();
            rebuilt[index] = updated.clone();
            *page = Arc::new(rebuilt);
            outcome.patched_pages += 1;
        }
    }

    let detail_changed = cache
        .detail(updated.cache_id())
        .map(|existing| *existing != *updated)
        .unwrap_or(true);
    if detail_changed {
        cache.set_detail(updated.clone());
        outcome.detail_updated = true;
    }

    if outcome.patched_pages > 0 || outcome.detail_updated {
        cache.mark_stale(scope);
        outcome.invalidated = true;
    }
    outcome
}

/// The caches the poller feeds, one per resource type.
#[derive(Debug, Default)]
pub struct CacheSet {
    vector_stores: std::sync::Mutex<QueryCache<VectorStore>>,
    files: std::sync::Mutex<QueryCache<VectorStoreFile>>,
}

impl CacheSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a poll snapshot to the matching cache.
    pub fn apply(&self, snapshot: &PendingSnapshot) -> ReconcileOutcome {
        match snapshot {
            PendingSnapshot::VectorStore(vs) => reconcile(&mut self.vector_stores(), vs),
            PendingSnapshot::VectorStoreFile(f) => reconcile(&mut self.files(), f),
        }
    }

    pub fn vector_stores(&self) -> std::sync::MutexGuard<'_, QueryCache<VectorStore>> {
        self.vector_stores
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn files(&self) -> std::sync::MutexGuard<'_, QueryCache<VectorStoreFile>> {
        self.files
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{ListParams, ResourceStatus};
    use crate::cache::ListKey;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn store(id: &str, status: ResourceStatus) -> VectorStore {
        VectorStore {
            id: id.to_string(),
            name: id.to_string(),
            status,
            file_counts: Default::default(),
            created_at: Utc::now(),
            last_error: None,
        }
    }

    fn file(id: &str, vs: &str, status: ResourceStatus) -> VectorStoreFile {
        VectorStoreFile {
            id: id.to_string(),
            vector_store_id: vs.to_string(),
            status,
            created_at: Utc::now(),
            usage_bytes: None,
            last_error: None,
        }
    }

    #[test]
    fn patches_only_pages_containing_the_resource() {
        let mut cache = QueryCache::new();
        let key = ListKey::new("vector_stores", &ListParams::default());
        let pending = store("vs_1", ResourceStatus::InProgress);
        cache.set_pages(
            key.clone(),
            vec![
                vec![pending.clone(), store("vs_2", ResourceStatus::Completed)],
                vec![store("vs_3", ResourceStatus::Completed)],
            ],
        );
        let untouched_before = cache.pages(&key).unwrap()[1].clone();

        let mut completed = pending;
        completed.status = ResourceStatus::Completed;
        let outcome = reconcile(&mut cache, &completed);
        assert_eq!(outcome.patched_pages, 1);
        assert!(outcome.invalidated);

        let pages = cache.pages(&key).unwrap();
        assert_eq!(pages[0][0].status, ResourceStatus::Completed);
        // The page without vs_1 keeps its identity.
        assert!(Arc::ptr_eq(&pages[1], &untouched_before));
        assert!(cache.is_stale("vector_stores"));
    }

    #[test]
    fn unchanged_update_is_a_no_op() {
        let mut cache = QueryCache::new();
        let key = ListKey::new("vector_stores", &ListParams::default());
        let vs = store("vs_1", ResourceStatus::Completed);
        cache.set_pages(key.clone(), vec![vec![vs.clone()]]);
        cache.set_detail(vs.clone());
        let page_before = cache.pages(&key).unwrap()[0].clone();

        let outcome = reconcile(&mut cache, &vs);
        assert_eq!(outcome, ReconcileOutcome::default());
        assert!(Arc::ptr_eq(&cache.pages(&key).unwrap()[0], &page_before));
        assert!(!cache.is_stale("vector_stores"));
    }

    #[test]
    fn never_inserts_missing_resources_into_pages() {
        let mut cache = QueryCache::new();
        let key = ListKey::new("vector_stores", &ListParams::default());
        cache.set_pages(key.clone(), vec![vec![store("vs_1", ResourceStatus::Completed)]]);

        let unseen = store("vs_9", ResourceStatus::Completed);
        let outcome = reconcile(&mut cache, &unseen);
        assert_eq!(outcome.patched_pages, 0);
        assert!(outcome.detail_updated);
        assert_eq!(cache.pages(&key).unwrap()[0].len(), 1);
    }

    #[test]
    fn patches_every_parameterization_holding_the_resource() {
        let mut cache = QueryCache::new();
        let default_key = ListKey::new("vector_stores", &ListParams::default());
        let filtered_key = ListKey::new(
            "vector_stores",
            &ListParams {
                search: Some("vs".to_string()),
                ..Default::default()
            },
        );
        let pending = store("vs_1", ResourceStatus::InProgress);
        cache.set_pages(default_key.clone(), vec![vec![pending.clone()]]);
        cache.set_pages(filtered_key.clone(), vec![vec![pending.clone()]]);

        let mut failed = pending;
        failed.status = ResourceStatus::Failed;
        let outcome = reconcile(&mut cache, &failed);
        assert_eq!(outcome.patched_pages, 2);
        assert_eq!(
            cache.pages(&filtered_key).unwrap()[0][0].status,
            ResourceStatus::Failed
        );
    }

    #[test]
    fn cache_set_routes_by_snapshot_kind() {
        let caches = CacheSet::new();
        let key = ListKey::new("vector_stores/vs_1/files", &ListParams::default());
        caches.files().set_pages(
            key.clone(),
            vec![vec![file("vsf_1", "vs_1", ResourceStatus::InProgress)]],
        );

        let outcome = caches.apply(&PendingSnapshot::VectorStoreFile(file(
            "vsf_1",
            "vs_1",
            ResourceStatus::Completed,
        )));
        assert_eq!(outcome.patched_pages, 1);
        assert_eq!(
            caches.files().pages(&key).unwrap()[0][0].status,
            ResourceStatus::Completed
        );
        assert_eq!(
            caches.files().take_stale(),
            vec!["vector_stores/vs_1/files".to_string()]
        );
    }
}

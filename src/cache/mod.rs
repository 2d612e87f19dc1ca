//! Query cache and the reconciler that patches polled updates into it.

mod reconciler;
mod store;

pub use reconciler::{reconcile, CacheSet, ReconcileOutcome};
pub use store::{CachedResource, ListKey, PageRef, QueryCache};

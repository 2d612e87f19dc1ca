//! `beekit watch` - follow a vector store until it settles.

use std::sync::Arc;

use crate::api::PlatformClient;
use crate::cache::CacheSet;
use crate::config::Config;
use crate::poll::{PendingTarget, StatusPoller};

pub async fn run_watch_command(vector_store_id: String, config: &Config) -> anyhow::Result<()> {
    config.api.require_key()?;
    let client = PlatformClient::new(&config.api)?;

    // Seed the cache and bail out early if the store is already settled.
    let store = client.get_vector_store(&vector_store_id).await?;
    println!("  {} is {}", store.id, store.status.as_str());
    if !store.status.is_pending() {
        return Ok(());
    }
    let caches = CacheSet::new();
    caches.vector_stores().set_detail(store);

    let (poller, mut updates) = StatusPoller::new(Arc::new(client), config.poll);
    poller
        .set_pending(vec![PendingTarget::VectorStore {
            id: vector_store_id,
        }])
        .await;

    while let Some(snapshot) = updates.recv().await {
        caches.apply(&snapshot);
        println!("  {} is {}", snapshot.id(), snapshot.status().as_str());
        if !snapshot.status().is_pending() {
            if let Some(error) = snapshot.last_error() {
                println!("  last error: {} ({})", error.message, error.code);
            }
            break;
        }
    }

    poller.shutdown();
    Ok(())
}

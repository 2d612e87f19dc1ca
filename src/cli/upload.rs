//! `beekit upload` - upload files and wait for embedding to finish.

use std::path::PathBuf;
use std::sync::Arc;

use crate::api::PlatformClient;
use crate::cache::CacheSet;
use crate::config::Config;
use crate::poll::{PendingSnapshot, StatusPoller};
use crate::upload::{AttachmentVerdict, UploadCollection, UploadStatus};

pub async fn run_upload_command(
    paths: Vec<PathBuf>,
    vector_store: Option<String>,
    thread: Option<String>,
    config: &Config,
) -> anyhow::Result<()> {
    config.api.require_key()?;
    let client = PlatformClient::new(&config.api)?;
    let mut collection = UploadCollection::new(
        client.clone(),
        config.upload.clone(),
        vector_store,
    );
    if let Some(thread_id) = thread {
        collection = collection.with_depends_on_thread(thread_id);
    }
    let collection = Arc::new(collection);

    for path in paths {
        match collection.add_file(&path).await {
            Ok(session) => {
                if let Some(rejection) = session.rejection() {
                    println!(
                        "  {} rejected: {} ({})",
                        session.filename(),
                        rejection.subject,
                        rejection.body
                    );
                }
            }
            Err(e) => println!("  {}: {e}", path.display()),
        }
    }

    let results = collection.submit_all().await;
    for (id, result) in &results {
        let Some(session) = collection.find(*id).await else {
            if let Err(e) = result {
                println!("  upload failed: {e}");
            }
            continue;
        };
        match result {
            Ok(_) => println!(
                "  {} {}",
                session.filename(),
                match session.status() {
                    UploadStatus::Complete => "uploaded",
                    _ => "uploaded, embedding...",
                }
            ),
            Err(e) => println!("  {}: {e}", session.filename()),
        }
    }

    // Poll attachments until every session settles, reconciling the local
    // cache along the way.
    let caches = CacheSet::new();
    let (poller, mut updates) = StatusPoller::new(Arc::new(client), config.poll);
    poller.set_pending(collection.pending_targets().await).await;

    while collection.is_pending().await {
        let Some(snapshot) = updates.recv().await else {
            break;
        };
        caches.apply(&snapshot);
        if let PendingSnapshot::VectorStoreFile(file) = &snapshot {
            match collection.apply_attachment_update(file).await {
                AttachmentVerdict::Completed(id) => {
                    if let Some(session) = collection.find(id).await {
                        println!("  {} embedded", session.filename());
                    }
                }
                AttachmentVerdict::Removed { status, .. } => {
                    println!("  embedding ended as {}", status.as_str());
                }
                AttachmentVerdict::Unchanged => {}
            }
        }
        poller.set_pending(collection.pending_targets().await).await;
    }

    poller.shutdown();
    Ok(())
}

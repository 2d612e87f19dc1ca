//! Controller for a batch of upload sessions bound to one vector store.

use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::api::types::{ResourceStatus, VectorStoreFile};
use crate::api::PlatformClient;
use crate::config::UploadConfig;
use crate::error::{ApiError, UploadError};
use crate::poll::PendingTarget;

use super::session::{SubmitResult, UploadSession};

/// What happened to a session when an attachment update was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentVerdict {
    /// Embedding finished; the session is now complete.
    Completed(Uuid),
    /// Embedding failed or was cancelled; the session was removed.
    Removed { session: Uuid, status: ResourceStatus },
    /// Still embedding, or no session owns this attachment.
    Unchanged,
}

/// Holds the sessions for one upload surface (e.g. one conversation's
/// attachments) and drives them as a batch.
pub struct UploadCollection {
    client: PlatformClient,
    config: UploadConfig,
    target_vector_store: Option<String>,
    depends_on_thread_id: Option<String>,
    sessions: RwLock<Vec<Arc<UploadSession>>>,
}

impl UploadCollection {
    pub fn new(
        client: PlatformClient,
        config: UploadConfig,
        target_vector_store: Option<String>,
    ) -> Self {
        Self {
            client,
            config,
            target_vector_store,
            depends_on_thread_id: None,
            sessions: RwLock::new(Vec::new()),
        }
    }

    /// Scope the batch to a conversation thread; every upload added after
    /// this carries the thread id.
    pub fn with_depends_on_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.depends_on_thread_id = Some(thread_id.into());
        self
    }

    pub fn target_vector_store(&self) -> Option<&str> {
        self.target_vector_store.as_deref()
    }

    /// Add a local file. Validation failures still produce a session (with
    /// its rejection attached) so they can be shown next to the file.
    pub async fn add_file(&self, path: impl Into<std::path::PathBuf>) -> Result<Arc<UploadSession>, UploadError> {
        let session = UploadSession::from_path_for_thread(
            path,
            &self.config,
            self.depends_on_thread_id.clone(),
        )
        .await?;
        self.sessions.write().await.push(session.clone());
        Ok(session)
    }

    /// Remove a session by id. Dropping the last reference closes its status
    /// watchers, so renderers detach without extra bookkeeping.
    pub async fn remove(&self, id: Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|s| s.id() != id);
        before != sessions.len()
    }

    pub async fn sessions(&self) -> Vec<Arc<UploadSession>> {
        self.sessions.read().await.clone()
    }

    pub async fn find(&self, id: Uuid) -> Option<Arc<UploadSession>> {
        self.sessions
            .read()
            .await
            .iter()
            .find(|s| s.id() == id)
            .cloned()
    }

    /// True while any session is uploading or embedding. Freshly added and
    /// rejected sessions do not count; neither does an empty collection.
    pub async fn is_pending(&self) -> bool {
        self.sessions
            .read()
            .await
            .iter()
            .any(|s| s.status().is_in_flight())
    }

    /// Submit every session. Submission starts in list order; the uploads
    /// themselves run concurrently. Sessions whose upload or attach request
    /// fails are removed from the collection; rejected sessions stay (their
    /// rejection is rendered inline) and are never retried.
    pub async fn submit_all(&self) -> Vec<(Uuid, SubmitResult)> {
        let sessions = self.sessions().await;
        let target = self.target_vector_store.as_deref();

        let submissions = sessions.iter().map(|session| {
            let session = session.clone();
            async move {
                let result = session.submit(&self.client, target).await;
                (session.id(), result)
            }
        });
        let results: Vec<(Uuid, SubmitResult)> =
            futures::future::join_all(submissions).await;

        for (id, result) in &results {
            if let Err(err) = result {
                match err.as_ref() {
                    UploadError::Rejected { .. } => {}
                    UploadError::Api(ApiError::RateLimited { .. }) => {
                        tracing::warn!(session = %id, "upload hit the usage limit");
                        self.remove(*id).await;
                    }
                    other => {
                        tracing::warn!(session = %id, "upload failed, dropping session: {}", other);
                        self.remove(*id).await;
                    }
                }
            }
        }
        results
    }

    /// Attachments still embedding, as poll targets.
    pub async fn pending_targets(&self) -> Vec<PendingTarget> {
        let mut targets = Vec::new();
        for session in self.sessions.read().await.iter() {
            if !session.status().is_in_flight() {
                continue;
            }
            if let Some(attachment) = session.remote_attachment().await {
                if attachment.status.is_pending() {
                    targets.push(PendingTarget::VectorStoreFile {
                        vector_store_id: attachment.vector_store_id.clone(),
                        id: attachment.id.clone(),
                    });
                }
            }
        }
        targets
    }

    /// Apply a polled attachment status to the owning session.
    ///
    /// A completed embedding marks the session complete; a failed or
    /// cancelled one removes the session so the batch can finish.
    pub async fn apply_attachment_update(&self, update: &VectorStoreFile) -> AttachmentVerdict {
        let session = {
            let sessions = self.sessions.read().await;
            let mut owner = None;
            for session in sessions.iter() {
                if session
                    .remote_attachment()
                    .await
                    .is_some_and(|a| a.id == update.id)
                {
                    owner = Some(session.clone());
                    break;
                }
            }
            owner
        };
        let Some(session) = session else {
            return AttachmentVerdict::Unchanged;
        };

        match update.status {
            ResourceStatus::Completed => {
                session.finish_embedding(ResourceStatus::Completed);
                AttachmentVerdict::Completed(session.id())
            }
            ResourceStatus::Failed | ResourceStatus::Cancelled => {
                let reason = update
                    .last_error
                    .as_ref()
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| "no error detail".to_string());
                tracing::warn!(
                    session = %session.id(),
                    file = session.filename(),
                    "embedding did not finish ({}): {}",
                    update.status.as_str(),
                    reason
                );
                self.remove(session.id()).await;
                AttachmentVerdict::Removed {
                    session: session.id(),
                    status: update.status,
                }
            }
            ResourceStatus::InProgress => AttachmentVerdict::Unchanged,
        }
    }
}

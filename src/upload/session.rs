//! One locally-selected file moving through validation, upload, and
//! attachment.
//!
//! A session is shared (`Arc`) between the owning collection, renderers
//! observing its status, and the submit future. Submission is idempotent:
//! the in-flight upload and attach requests are memoized so repeated calls
//! await the same attempt instead of re-issuing it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{watch, OnceCell, RwLock};
use uuid::Uuid;

use crate::api::types::{FilePurpose, FileRecord, ResourceStatus, VectorStoreFile};
use crate::api::PlatformClient;
use crate::config::UploadConfig;
use crate::error::UploadError;

/// Image formats the platform stores but cannot extract text from.
/// They upload fine; they are never attached to a vector store.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Client-side status of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    New,
    Uploading,
    Embedding,
    Complete,
}

impl UploadStatus {
    /// A session is in flight between submission and completion.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Uploading | Self::Embedding)
    }
}

/// Human-readable validation failure, surfaced inline next to the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub subject: String,
    pub body: String,
}

/// Validate a file against the configured constraints.
///
/// Runs before any network call; a rejected file never reaches the upload
/// endpoint.
pub fn validate(path: &Path, size: u64, config: &UploadConfig) -> Result<(), Rejection> {
    if size > config.max_file_bytes {
        return Err(Rejection {
            subject: "File size exceeds limit".to_string(),
            body: format!(
                "The maximum file size is {} MiB.",
                config.max_file_bytes / (1024 * 1024)
            ),
        });
    }

    let extension = file_extension(path);
    let allowed = extension.as_deref().is_some_and(|ext| {
        config.allowed_extensions.iter().any(|a| a == ext)
            || IMAGE_EXTENSIONS.contains(&ext)
    });
    if !allowed {
        return Err(Rejection {
            subject: "File type not supported".to_string(),
            body: format!(
                "Supported types: {}.",
                config.allowed_extensions.join(", ")
            ),
        });
    }

    Ok(())
}

fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

/// Result of a (possibly memoized) submission.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// Uploaded only; the session is already complete.
    Stored(FileRecord),
    /// Uploaded and attached; completion is deferred until the poller
    /// confirms the attachment left `in_progress`.
    Attached {
        file: FileRecord,
        attachment: VectorStoreFile,
    },
}

pub type SubmitResult = Result<SubmitOutcome, Arc<UploadError>>;

#[derive(Debug, Default)]
struct RemoteState {
    file: Option<FileRecord>,
    attachment: Option<VectorStoreFile>,
}

/// One file's journey: `new → uploading → (embedding | complete) → complete`.
pub struct UploadSession {
    id: Uuid,
    path: PathBuf,
    filename: String,
    size: u64,
    is_readable: bool,
    rejection: Option<Rejection>,
    depends_on_thread_id: Option<String>,
    status_tx: watch::Sender<UploadStatus>,
    upload_once: OnceCell<Result<FileRecord, Arc<UploadError>>>,
    attach_once: OnceCell<Result<VectorStoreFile, Arc<UploadError>>>,
    remote: RwLock<RemoteState>,
}

impl UploadSession {
    /// Create a session for a local file, validating it up front.
    ///
    /// A file that fails validation still yields a session (so the rejection
    /// can be rendered inline); it just refuses to submit.
    pub async fn from_path(
        path: impl Into<PathBuf>,
        config: &UploadConfig,
    ) -> Result<Arc<Self>, UploadError> {
        Self::from_path_for_thread(path, config, None).await
    }

    /// Like [`Self::from_path`], scoping the upload to a conversation thread
    /// so the platform ties the file's lifetime to that thread.
    pub async fn from_path_for_thread(
        path: impl Into<PathBuf>,
        config: &UploadConfig,
        depends_on_thread_id: Option<String>,
    ) -> Result<Arc<Self>, UploadError> {
        let path = path.into();
        let metadata =
            tokio::fs::metadata(&path)
                .await
                .map_err(|_| UploadError::FileNotFound {
                    path: path.display().to_string(),
                })?;
        let size = metadata.len();

        let rejection = validate(&path, size, config).err();
        let is_readable = file_extension(&path)
            .is_some_and(|ext| config.allowed_extensions.iter().any(|a| *a == ext));
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());

        let (status_tx, _) = watch::channel(UploadStatus::New);
        Ok(Arc::new(Self {
            id: Uuid::new_v4(),
            path,
            filename,
            size,
            is_readable,
            rejection,
            depends_on_thread_id,
            status_tx,
            upload_once: OnceCell::new(),
            attach_once: OnceCell::new(),
            remote: RwLock::new(RemoteState::default()),
        }))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether the file's content can be extracted and embedded.
    /// When false, the session never attaches to a vector store.
    pub fn is_readable(&self) -> bool {
        self.is_readable
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        self.rejection.as_ref()
    }

    /// Conversation thread this upload is scoped to, if any. Forwarded with
    /// the upload request.
    pub fn depends_on_thread_id(&self) -> Option<&str> {
        self.depends_on_thread_id.as_deref()
    }

    pub fn status(&self) -> UploadStatus {
        *self.status_tx.borrow()
    }

    /// Observe status changes. Receivers detach by dropping; dropping the
    /// session closes all receivers.
    pub fn subscribe(&self) -> watch::Receiver<UploadStatus> {
        self.status_tx.subscribe()
    }

    pub async fn remote_file(&self) -> Option<FileRecord> {
        self.remote.read().await.file.clone()
    }

    pub async fn remote_attachment(&self) -> Option<VectorStoreFile> {
        self.remote.read().await.attachment.clone()
    }

    fn set_status(&self, status: UploadStatus) {
        // Complete is terminal: a later submit replaying the memoized attach
        // snapshot must not pull a finished session back to embedding.
        self.status_tx.send_if_modified(|current| {
            if *current == status || *current == UploadStatus::Complete {
                return false;
            }
            *current = status;
            true
        });
    }

    /// Upload the file and, when readable and a target store is given,
    /// attach it.
    ///
    /// Idempotent: concurrent and repeated calls share one upload request
    /// and one attach request. A rejected session returns its rejection
    /// without touching the network.
    pub async fn submit(
        &self,
        client: &PlatformClient,
        target_vector_store: Option<&str>,
    ) -> SubmitResult {
        if let Some(rejection) = &self.rejection {
            return Err(Arc::new(UploadError::Rejected {
                subject: rejection.subject.clone(),
                body: rejection.body.clone(),
            }));
        }

        let upload = self
            .upload_once
            .get_or_init(|| async {
                self.set_status(UploadStatus::Uploading);
                tracing::debug!(session = %self.id, file = %self.filename, "uploading file");
                client
                    .upload_file(
                        &self.path,
                        FilePurpose::Assistants,
                        self.depends_on_thread_id.as_deref(),
                    )
                    .await
                    .map_err(|e| Arc::new(UploadError::from(e)))
            })
            .await
            .clone();
        let file = upload?;
        self.remote.write().await.file = Some(file.clone());

        let Some(vector_store_id) = target_vector_store.filter(|_| self.is_readable) else {
            self.set_status(UploadStatus::Complete);
            return Ok(SubmitOutcome::Stored(file));
        };

        let attach = self
            .attach_once
            .get_or_init(|| async {
                tracing::debug!(
                    session = %self.id,
                    vector_store = vector_store_id,
                    file_id = %file.id,
                    "attaching file to vector store"
                );
                client
                    .attach_file(vector_store_id, &file.id)
                    .await
                    .map_err(|e| Arc::new(UploadError::from(e)))
            })
            .await
            .clone();
        let attachment = attach?;
        self.remote.write().await.attachment = Some(attachment.clone());

        // Bytes are stored, but the file is not searchable yet: completion
        // waits for the poller to confirm embedding finished.
        if attachment.status.is_pending() {
            self.set_status(UploadStatus::Embedding);
        } else {
            self.set_status(UploadStatus::Complete);
        }
        Ok(SubmitOutcome::Attached { file, attachment })
    }

    /// Apply the poller's verdict on this session's attachment.
    pub(crate) fn finish_embedding(&self, status: ResourceStatus) {
        if status == ResourceStatus::Completed {
            self.set_status(UploadStatus::Complete);
        }
    }
}

impl std::fmt::Debug for UploadSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadSession")
            .field("id", &self.id)
            .field("filename", &self.filename)
            .field("status", &self.status())
            .field("is_readable", &self.is_readable)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadConfig;

    fn test_config() -> UploadConfig {
        UploadConfig::default()
    }

    #[test]
    fn oversize_file_is_rejected_with_limit_subject() {
        let config = UploadConfig {
            max_file_bytes: 1024,
            ..test_config()
        };
        let err = validate(Path::new("big.pdf"), 2048, &config).unwrap_err();
        assert_eq!(err.subject, "File size exceeds limit");
    }

    #[test]
    fn disallowed_extension_is_rejected() {
        let err = validate(Path::new("tool.exe"), 10, &test_config()).unwrap_err();
        assert_eq!(err.subject, "File type not supported");
        assert!(err.body.contains("pdf"));
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(validate(Path::new("Notes.PDF"), 10, &test_config()).is_ok());
    }

    #[test]
    fn images_upload_but_are_not_readable() {
        assert!(validate(Path::new("diagram.png"), 10, &test_config()).is_ok());
    }

    #[tokio::test]
    async fn session_for_missing_file_fails() {
        let err = UploadSession::from_path("/nonexistent/nope.pdf", &test_config())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn new_session_reports_metadata_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# hello").unwrap();

        let session = UploadSession::from_path(&path, &test_config())
            .await
            .unwrap();
        assert_eq!(session.status(), UploadStatus::New);
        assert_eq!(session.filename(), "notes.md");
        assert!(session.is_readable());
        assert!(session.rejection().is_none());
        assert!(session.remote_file().await.is_none());
    }

    #[tokio::test]
    async fn image_session_is_not_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        std::fs::write(&path, [0u8; 4]).unwrap();

        let session = UploadSession::from_path(&path, &test_config())
            .await
            .unwrap();
        assert!(session.rejection().is_none());
        assert!(!session.is_readable());
    }

    #[tokio::test]
    async fn rejected_session_refuses_to_submit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tool.exe");
        std::fs::write(&path, [0u8; 4]).unwrap();

        let session = UploadSession::from_path(&path, &test_config())
            .await
            .unwrap();
        assert!(session.rejection().is_some());

        // Submitting against an unroutable client must not matter: the
        // rejection short-circuits before any request is built.
        let client =
            PlatformClient::new(&crate::config::ApiConfig::new("http://127.0.0.1:1", "k"))
                .unwrap();
        let err = session.submit(&client, None).await.unwrap_err();
        assert!(matches!(&*err, UploadError::Rejected { subject, .. }
            if subject == "File size exceeds limit" || subject == "File type not supported"));
        assert_eq!(session.status(), UploadStatus::New);
    }

    #[tokio::test]
    async fn status_watch_notifies_subscribers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hi").unwrap();

        let session = UploadSession::from_path(&path, &test_config())
            .await
            .unwrap();
        let mut rx_a = session.subscribe();
        let mut rx_b = session.subscribe();

        session.set_status(UploadStatus::Uploading);
        rx_a.changed().await.unwrap();
        assert_eq!(*rx_a.borrow(), UploadStatus::Uploading);

        // Dropping one observer must not affect the other.
        drop(rx_a);
        session.set_status(UploadStatus::Complete);
        rx_b.changed().await.unwrap();
        assert_eq!(*rx_b.borrow(), UploadStatus::Complete);
    }

    fn bare_session(status: UploadStatus) -> UploadSession {
        let (status_tx, _) = watch::channel(status);
        UploadSession {
            id: Uuid::new_v4(),
            path: PathBuf::from("notes.txt"),
            filename: "notes.txt".to_string(),
            size: 2,
            is_readable: true,
            rejection: None,
            depends_on_thread_id: None,
            status_tx,
            upload_once: OnceCell::new(),
            attach_once: OnceCell::new(),
            remote: RwLock::new(RemoteState::default()),
        }
    }

    #[test]
    fn finish_embedding_only_completes_on_success() {
        let session = bare_session(UploadStatus::Embedding);

        session.finish_embedding(ResourceStatus::Failed);
        assert_eq!(session.status(), UploadStatus::Embedding);

        session.finish_embedding(ResourceStatus::Completed);
        assert_eq!(session.status(), UploadStatus::Complete);
    }

    #[test]
    fn complete_status_is_terminal() {
        let session = bare_session(UploadStatus::Complete);

        session.set_status(UploadStatus::Embedding);
        assert_eq!(session.status(), UploadStatus::Complete);

        session.set_status(UploadStatus::Uploading);
        assert_eq!(session.status(), UploadStatus::Complete);
    }

    #[tokio::test]
    async fn thread_scoped_session_carries_the_thread_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# hello").unwrap();

        let session = UploadSession::from_path_for_thread(
            &path,
            &test_config(),
            Some("thread_42".to_string()),
        )
        .await
        .unwrap();
        assert_eq!(session.depends_on_thread_id(), Some("thread_42"));

        let plain = UploadSession::from_path(&path, &test_config()).await.unwrap();
        assert!(plain.depends_on_thread_id().is_none());
    }
}

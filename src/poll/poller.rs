//! Polling loops that watch pending resources until they settle.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::api::types::{LastError, ResourceStatus, VectorStore, VectorStoreFile};
use crate::api::PlatformClient;
use crate::config::PollConfig;
use crate::error::ApiError;

use super::backoff::LinearBackoff;

/// A remote resource the poller should track until it leaves `in_progress`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PendingTarget {
    VectorStore {
        id: String,
    },
    VectorStoreFile {
        vector_store_id: String,
        id: String,
    },
}

impl PendingTarget {
    pub fn id(&self) -> &str {
        match self {
            Self::VectorStore { id } => id,
            Self::VectorStoreFile { id, .. } => id,
        }
    }
}

impl std::fmt::Display for PendingTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VectorStore { id } => write!(f, "vector_store {id}"),
            Self::VectorStoreFile {
                vector_store_id,
                id,
            } => write!(f, "vector_store_file {vector_store_id}/{id}"),
        }
    }
}

/// A freshly fetched view of a tracked resource.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingSnapshot {
    VectorStore(VectorStore),
    VectorStoreFile(VectorStoreFile),
}

impl PendingSnapshot {
    pub fn id(&self) -> &str {
        match self {
            Self::VectorStore(vs) => &vs.id,
            Self::VectorStoreFile(f) => &f.id,
        }
    }

    pub fn status(&self) -> ResourceStatus {
        match self {
            Self::VectorStore(vs) => vs.status,
            Self::VectorStoreFile(f) => f.status,
        }
    }

    pub fn last_error(&self) -> Option<&LastError> {
        match self {
            Self::VectorStore(vs) => vs.last_error.as_ref(),
            Self::VectorStoreFile(f) => f.last_error.as_ref(),
        }
    }
}

/// Fetches the current state of a poll target. Implemented by the real
/// client; tests substitute scripted fetchers.
#[async_trait]
pub trait StatusFetcher: Send + Sync + 'static {
    async fn fetch(&self, target: &PendingTarget) -> Result<PendingSnapshot, ApiError>;
}

#[async_trait]
impl StatusFetcher for PlatformClient {
    async fn fetch(&self, target: &PendingTarget) -> Result<PendingSnapshot, ApiError> {
        match target {
            PendingTarget::VectorStore { id } => {
                Ok(PendingSnapshot::VectorStore(self.get_vector_store(id).await?))
            }
            PendingTarget::VectorStoreFile {
                vector_store_id,
                id,
            } => Ok(PendingSnapshot::VectorStoreFile(
                self.get_vector_store_file(vector_store_id, id).await?,
            )),
        }
    }
}

struct LoopHandle {
    generation: u64,
    token: CancellationToken,
}

type LoopMap = Arc<Mutex<HashMap<PendingTarget, LoopHandle>>>;

/// Drives one polling loop per pending resource.
///
/// `set_pending` owns the set of targets: newly seen targets get a loop,
/// vanished targets get cancelled, and any difference resets the shared
/// backoff so fresh work is polled eagerly. A loop ends on its own as soon
/// as its resource reports a terminal status; transport errors are logged
/// and the loop keeps going.
pub struct StatusPoller<F> {
    fetcher: Arc<F>,
    backoff: Arc<LinearBackoff>,
    updates: mpsc::UnboundedSender<PendingSnapshot>,
    loops: LoopMap,
    next_generation: std::sync::atomic::AtomicU64,
    root: CancellationToken,
}

impl<F: StatusFetcher> StatusPoller<F> {
    pub fn new(
        fetcher: Arc<F>,
        config: PollConfig,
    ) -> (Self, mpsc::UnboundedReceiver<PendingSnapshot>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let poller = Self {
            fetcher,
            backoff: Arc::new(LinearBackoff::new(config)),
            updates,
            loops: Arc::new(Mutex::new(HashMap::new())),
            next_generation: std::sync::atomic::AtomicU64::new(0),
            root: CancellationToken::new(),
        };
        (poller, rx)
    }

    /// Replace the tracked set. No-op (and no backoff reset) when the set is
    /// unchanged.
    pub async fn set_pending(&self, targets: Vec<PendingTarget>) {
        let mut loops = self.loops.lock().await;

        let mut changed = false;
        let stale: Vec<PendingTarget> = loops
            .keys()
            .filter(|t| !targets.contains(t))
            .cloned()
            .collect();
        for target in stale {
            if let Some(handle) = loops.remove(&target) {
                tracing::debug!("stopped polling {target}");
                handle.token.cancel();
                changed = true;
            }
        }

        for target in targets {
            if loops.contains_key(&target) {
                continue;
            }
            changed = true;
            let generation = self
                .next_generation
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            let token = self.root.child_token();
            loops.insert(
                target.clone(),
                LoopHandle {
                    generation,
                    token: token.clone(),
                },
            );
            tracing::debug!("started polling {target}");
            tokio::spawn(run_loop(
                self.fetcher.clone(),
                target,
                generation,
                self.backoff.clone(),
                self.updates.clone(),
                self.loops.clone(),
                token,
            ));
        }

        if changed {
            self.backoff.reset();
        }
    }

    /// Number of live polling loops.
    pub async fn active_count(&self) -> usize {
        self.loops.lock().await.len()
    }

    /// Cancel every loop.
    pub fn shutdown(&self) {
        self.root.cancel();
    }
}

impl<F> Drop for StatusPoller<F> {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

async fn run_loop<F: StatusFetcher>(
    fetcher: Arc<F>,
    target: PendingTarget,
    generation: u64,
    backoff: Arc<LinearBackoff>,
    updates: mpsc::UnboundedSender<PendingSnapshot>,
    loops: LoopMap,
    token: CancellationToken,
) {
    // Targets enter the poller already known to be in progress; only a
    // change from that is worth forwarding.
    let mut last_seen = ResourceStatus::InProgress;
    loop {
        let delay = backoff.next_delay();
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        match fetcher.fetch(&target).await {
            Ok(snapshot) => {
                let status = snapshot.status();
                if status != last_seen {
                    last_seen = status;
                    if updates.send(snapshot).is_err() {
                        break;
                    }
                }
                if !status.is_pending() {
                    tracing::debug!("{target} settled as {}", status.as_str());
                    break;
                }
            }
            Err(e) => {
                // Still pending as far as we know; the next tick retries.
                tracing::debug!("poll of {target} failed, will retry: {e}");
            }
        }
    }

    // Unregister, unless set_pending has already replaced this loop.
    let mut loops = loops.lock().await;
    if loops.get(&target).is_some_and(|h| h.generation == generation) {
        loops.remove(&target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_config() -> PollConfig {
        PollConfig {
            duration_start: Duration::from_millis(5),
            increase_step: Duration::from_millis(1),
            count_without_increase: 10,
        }
    }

    fn store(id: &str, status: ResourceStatus) -> PendingSnapshot {
        PendingSnapshot::VectorStore(VectorStore {
            id: id.to_string(),
            name: "test store".to_string(),
            status,
            file_counts: Default::default(),
            created_at: Utc::now(),
            last_error: None,
        })
    }

    /// Pending for `pending_polls` fetches, then completed.
    struct ScriptedFetcher {
        pending_polls: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl StatusFetcher for ScriptedFetcher {
        async fn fetch(&self, target: &PendingTarget) -> Result<PendingSnapshot, ApiError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let status = if call <= self.pending_polls {
                ResourceStatus::InProgress
            } else {
                ResourceStatus::Completed
            };
            Ok(store(target.id(), status))
        }
    }

    /// Always fails in transport.
    struct FailingFetcher {
        calls: AtomicU32,
    }

    #[async_trait]
    impl StatusFetcher for FailingFetcher {
        async fn fetch(&self, _target: &PendingTarget) -> Result<PendingSnapshot, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ApiError::RequestFailed {
                endpoint: "/vector_stores/vs_1".to_string(),
                reason: "connection refused".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn loop_ends_on_terminal_status_and_forwards_the_change() {
        let fetcher = Arc::new(ScriptedFetcher {
            pending_polls: 2,
            calls: AtomicU32::new(0),
        });
        let (poller, mut rx) = StatusPoller::new(fetcher.clone(), fast_config());
        poller
            .set_pending(vec![PendingTarget::VectorStore {
                id: "vs_1".to_string(),
            }])
            .await;

        let snapshot = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out")
            .expect("channel closed");
        assert_eq!(snapshot.id(), "vs_1");
        assert_eq!(snapshot.status(), ResourceStatus::Completed);

        // The loop unregisters itself once the resource settles.
        tokio::time::timeout(Duration::from_secs(2), async {
            while poller.active_count().await != 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("loop did not wind down");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn in_progress_polls_are_not_forwarded() {
        let fetcher = Arc::new(ScriptedFetcher {
            pending_polls: 3,
            calls: AtomicU32::new(0),
        });
        let (poller, mut rx) = StatusPoller::new(fetcher, fast_config());
        poller
            .set_pending(vec![PendingTarget::VectorStore {
                id: "vs_1".to_string(),
            }])
            .await;

        // The only message is the terminal one.
        let snapshot = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out")
            .expect("channel closed");
        assert_eq!(snapshot.status(), ResourceStatus::Completed);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn transport_errors_keep_the_loop_alive() {
        let fetcher = Arc::new(FailingFetcher {
            calls: AtomicU32::new(0),
        });
        let (poller, _rx) = StatusPoller::new(fetcher.clone(), fast_config());
        poller
            .set_pending(vec![PendingTarget::VectorStore {
                id: "vs_1".to_string(),
            }])
            .await;

        tokio::time::timeout(Duration::from_secs(2), async {
            while fetcher.calls.load(Ordering::SeqCst) < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("loop stopped retrying");
        assert_eq!(poller.active_count().await, 1);
        poller.shutdown();
    }

    #[tokio::test]
    async fn removed_targets_are_cancelled() {
        let fetcher = Arc::new(ScriptedFetcher {
            pending_polls: u32::MAX,
            calls: AtomicU32::new(0),
        });
        let (poller, _rx) = StatusPoller::new(fetcher, fast_config());

        let a = PendingTarget::VectorStore {
            id: "vs_a".to_string(),
        };
        let b = PendingTarget::VectorStore {
            id: "vs_b".to_string(),
        };
        poller.set_pending(vec![a.clone(), b.clone()]).await;
        assert_eq!(poller.active_count().await, 2);

        poller.set_pending(vec![a.clone()]).await;
        assert_eq!(poller.active_count().await, 1);

        poller.set_pending(vec![]).await;
        assert_eq!(poller.active_count().await, 0);
    }

    #[tokio::test]
    async fn unchanged_set_does_not_reset_backoff() {
        let fetcher = Arc::new(ScriptedFetcher {
            pending_polls: u32::MAX,
            calls: AtomicU32::new(0),
        });
        let (poller, _rx) = StatusPoller::new(fetcher, fast_config());
        let target = PendingTarget::VectorStore {
            id: "vs_1".to_string(),
        };

        poller.set_pending(vec![target.clone()]).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let polls_before = poller.backoff.polls();
        assert!(polls_before > 0);

        poller.set_pending(vec![target.clone()]).await;
        assert!(poller.backoff.polls() >= polls_before);

        // A genuinely different set resets the counter.
        poller
            .set_pending(vec![
                target,
                PendingTarget::VectorStore {
                    id: "vs_2".to_string(),
                },
            ])
            .await;
        assert_eq!(poller.backoff.polls(), 0);
        poller.shutdown();
    }
}

//! Pending status polling with shared linear backoff.

mod backoff;
mod poller;

pub use backoff::LinearBackoff;
pub use poller::{PendingSnapshot, PendingTarget, StatusFetcher, StatusPoller};

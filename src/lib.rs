//! Client toolkit for the bee agent platform.
//!
//! Four subsystems, usable independently:
//! - [`upload`]: per-file upload sessions and the batch collection that
//!   drives them through upload, attach, and embedding.
//! - [`poll`]: polling loops with shared linear backoff that watch pending
//!   resources until they settle.
//! - [`cache`]: a query cache plus the reconciler that patches polled
//!   status changes into cached pages copy-on-write.
//! - [`bridge`]: the request/response protocol between a host and a
//!   sandboxed app runtime, with a WebSocket server transport.

pub mod api;
pub mod bootstrap;
pub mod bridge;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod poll;
pub mod settings;
pub mod upload;

pub use config::Config;
pub use error::{Error, Result};

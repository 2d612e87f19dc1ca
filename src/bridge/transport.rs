//! Transports that carry host messages into the sandbox.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::BridgeError;

use super::protocol::HostMessage;

/// Delivery side of the bridge. The host posts every outbound message to
/// the currently attached transport with an explicit target origin; a
/// transport must never broadcast.
#[async_trait]
pub trait SandboxTransport: Send + Sync + 'static {
    async fn deliver(&self, target_origin: &str, message: HostMessage) -> Result<(), BridgeError>;
}

/// In-process transport used by tests and embedders: messages land on an
/// unbounded channel together with the origin they were addressed to.
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<(String, HostMessage)>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, HostMessage)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl SandboxTransport for ChannelTransport {
    async fn deliver(&self, target_origin: &str, message: HostMessage) -> Result<(), BridgeError> {
        self.tx
            .send((target_origin.to_string(), message))
            .map_err(|_| BridgeError::Transport {
                reason: "sandbox receiver dropped".to_string(),
            })
    }
}

//! Sandbox bridge: protocol types, the relaying host, and transports.

mod host;
mod protocol;
mod server;
mod services;
mod transport;

pub use host::{BridgeHost, BridgePhase};
pub use protocol::{
    FixErrorRequest, HostMessage, ModulesToPackagesRequest, RequestType, SandboxMessage,
    StateChange, Theme,
};
pub use server::{start_server, BridgeServerState};
pub use services::{BridgeServices, PlatformServices};
pub use transport::{ChannelTransport, SandboxTransport};

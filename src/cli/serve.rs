//! `beekit serve` - run the sandbox bridge server.

use std::sync::Arc;

use secrecy::ExposeSecret;

use crate::api::PlatformClient;
use crate::bridge::{start_server, BridgeHost, BridgeServerState, PlatformServices};
use crate::config::Config;

pub async fn run_serve_command(config: &Config) -> anyhow::Result<()> {
    config.api.require_key()?;
    let client = PlatformClient::new(&config.api)?;
    let services = Arc::new(PlatformServices::new(client));
    let host = Arc::new(BridgeHost::new(
        services,
        config.bridge.sandbox_origin.clone(),
    ));

    let state = Arc::new(BridgeServerState {
        host,
        auth_token: config
            .bridge
            .auth_token
            .as_ref()
            .map(|t| t.expose_secret().to_string()),
    });
    let bound = start_server(config.bridge.listen_addr, state).await?;
    println!(
        "  bridge listening on ws://{bound}/bridge/ws for sandbox origin {}",
        config.bridge.sandbox_origin
    );

    tokio::signal::ctrl_c().await?;
    println!("  shutting down");
    Ok(())
}

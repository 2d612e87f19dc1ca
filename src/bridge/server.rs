//! WebSocket endpoint that carries the bridge protocol.
//!
//! The sandboxed runtime connects here instead of posting window messages.
//! The HTTP `Origin` header of the upgrade request plays the role of the
//! message origin: it is captured once at connect time and attached to
//! every inbound message, so the host's origin check applies unchanged.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::BridgeError;

use super::host::BridgeHost;
use super::protocol::{HostMessage, SandboxMessage};
use super::services::BridgeServices;
use super::transport::SandboxTransport;

pub struct BridgeServerState<S> {
    pub host: Arc<BridgeHost<S>>,
    pub auth_token: Option<String>,
}

/// Bind the bridge server and serve it in the background. Returns the bound
/// address (useful with port 0).
pub async fn start_server<S: BridgeServices>(
    addr: SocketAddr,
    state: Arc<BridgeServerState<S>>,
) -> Result<SocketAddr, BridgeError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| BridgeError::Transport {
            reason: format!("Failed to bind to {}: {}", addr, e),
        })?;
    let bound_addr = listener
        .local_addr()
        .map_err(|e| BridgeError::Transport {
            reason: format!("Failed to get local addr: {}", e),
        })?;

    let app = Router::new()
        .route("/bridge/ws", get(bridge_ws_handler::<S>))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("bridge server stopped: {e}");
        }
    });

    tracing::info!("bridge server listening on {bound_addr}");
    Ok(bound_addr)
}

#[derive(Deserialize)]
struct WsQuery {
    token: Option<String>,
}

async fn bridge_ws_handler<S: BridgeServices>(
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
    State(state): State<Arc<BridgeServerState<S>>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if let Some(expected) = &state.auth_token {
        if query.token.as_deref() != Some(expected.as_str()) {
            return Err((StatusCode::UNAUTHORIZED, "Invalid token".to_string()));
        }
    }

    // Browsers always send Origin on WS upgrades; a missing header means a
    // non-browser client trying to sidestep the origin check.
    let origin = headers
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| {
            (
                StatusCode::FORBIDDEN,
                "WebSocket Origin header required".to_string(),
            )
        })?;

    Ok(ws.on_upgrade(move |socket| handle_connection(socket, origin, state)))
}

struct WsTransport {
    sink: Mutex<futures::stream::SplitSink<WebSocket, Message>>,
}

#[async_trait::async_trait]
impl SandboxTransport for WsTransport {
    async fn deliver(&self, _target_origin: &str, message: HostMessage) -> Result<(), BridgeError> {
        // Origin routing is already decided: this socket is the one sandbox.
        let json = serde_json::to_string(&message)?;
        self.sink
            .lock()
            .await
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| BridgeError::Transport {
                reason: e.to_string(),
            })
    }
}

async fn handle_connection<S: BridgeServices>(
    socket: WebSocket,
    origin: String,
    state: Arc<BridgeServerState<S>>,
) {
    let (sink, mut stream) = socket.split();
    let transport = Arc::new(WsTransport {
        sink: Mutex::new(sink),
    });
    state.host.attach_transport(transport).await;
    tracing::debug!("sandbox connected from {origin}");

    while let Some(frame) = stream.next().await {
        let message = match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<SandboxMessage>(text.as_str())
            {
                Ok(message) => message,
                Err(e) => {
                    tracing::debug!("ignoring malformed sandbox message: {e}");
                    continue;
                }
            },
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        if let Err(e) = state.host.handle_message(&origin, message).await {
            match e {
                BridgeError::OriginMismatch { .. } => {}
                other => tracing::warn!("bridge message handling failed: {other}"),
            }
        }
    }

    state.host.detach_transport().await;
    tracing::debug!("sandbox from {origin} disconnected");
}

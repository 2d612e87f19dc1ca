//! Host side of the sandbox bridge.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};

use crate::error::{ApiError, BridgeError};

use super::protocol::{
    FixErrorRequest, HostMessage, ModulesToPackagesRequest, RequestType, SandboxMessage,
    StateChange,
};
use super::services::BridgeServices;
use super::transport::SandboxTransport;

/// Lifecycle of the sandbox connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgePhase {
    Loading,
    Ready,
}

const USAGE_LIMIT_MESSAGE: &str =
    "You have reached the usage limit for this feature. Please try again later.";

#[derive(Debug)]
struct HostState {
    phase: BridgePhase,
    retained: StateChange,
    ready_count: u64,
}

/// Relays state into the sandbox and answers its service requests.
///
/// State pushes before the sandbox signals ready are not sent; they merge
/// into a retained snapshot that is replayed in full on every ready signal,
/// so a sandbox reload (which raises a fresh ready) never loses state.
pub struct BridgeHost<S> {
    services: Arc<S>,
    expected_origin: String,
    state: Mutex<HostState>,
    transport: RwLock<Option<Arc<dyn SandboxTransport>>>,
}

impl<S: BridgeServices> BridgeHost<S> {
    pub fn new(services: Arc<S>, expected_origin: impl Into<String>) -> Self {
        Self {
            services,
            expected_origin: expected_origin.into(),
            state: Mutex::new(HostState {
                phase: BridgePhase::Loading,
                retained: StateChange::default(),
                ready_count: 0,
            }),
            transport: RwLock::new(None),
        }
    }

    pub fn expected_origin(&self) -> &str {
        &self.expected_origin
    }

    pub async fn phase(&self) -> BridgePhase {
        self.state.lock().await.phase
    }

    /// How many times the sandbox has signalled ready (i.e. loaded).
    pub async fn ready_count(&self) -> u64 {
        self.state.lock().await.ready_count
    }

    /// Attach a delivery path to a (re)loaded sandbox. The phase drops back
    /// to loading until that sandbox signals ready.
    pub async fn attach_transport(&self, transport: Arc<dyn SandboxTransport>) {
        *self.transport.write().await = Some(transport);
        self.state.lock().await.phase = BridgePhase::Loading;
    }

    pub async fn detach_transport(&self) {
        *self.transport.write().await = None;
        self.state.lock().await.phase = BridgePhase::Loading;
    }

    /// Push a state delta. Always retained; only forwarded once the sandbox
    /// is ready.
    pub async fn push_state(&self, change: StateChange) -> Result<(), BridgeError> {
        let ready = {
            let mut state = self.state.lock().await;
            state.retained.merge_from(&change);
            state.phase == BridgePhase::Ready
        };
        if ready {
            self.send(HostMessage::UpdateState {
                state_change: change,
            })
            .await?;
        }
        Ok(())
    }

    /// Handle one inbound sandbox message.
    ///
    /// A message from any origin other than the configured sandbox origin is
    /// rejected before processing; nothing is sent back for it.
    pub async fn handle_message(
        &self,
        origin: &str,
        message: SandboxMessage,
    ) -> Result<(), BridgeError> {
        if origin != self.expected_origin {
            tracing::warn!(
                "dropping sandbox message from unexpected origin {origin} (expected {})",
                self.expected_origin
            );
            return Err(BridgeError::OriginMismatch {
                expected: self.expected_origin.clone(),
                got: origin.to_string(),
            });
        }

        match message {
            SandboxMessage::Ready => self.on_ready().await,
            SandboxMessage::Request {
                request_id,
                request_type,
                payload,
            } => {
                let payload = self.dispatch(request_type, payload).await;
                self.send(HostMessage::Response {
                    request_id,
                    payload,
                })
                .await
            }
        }
    }

    async fn on_ready(&self) -> Result<(), BridgeError> {
        let retained = {
            let mut state = self.state.lock().await;
            state.phase = BridgePhase::Ready;
            state.ready_count += 1;
            tracing::debug!("sandbox ready (load #{})", state.ready_count);
            state.retained.clone()
        };
        if retained.is_empty() {
            return Ok(());
        }
        self.send(HostMessage::UpdateState {
            state_change: retained,
        })
        .await
    }

    /// Run one service request. Failures become an in-band `{error}` payload
    /// so the sandbox always receives a response with a stable shape.
    async fn dispatch(&self, request_type: RequestType, payload: Value) -> Value {
        match self.run_service(request_type, payload).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("bridge request {} failed: {e}", request_type.as_str());
                json!({ "error": service_error_message(&e) })
            }
        }
    }

    async fn run_service(
        &self,
        request_type: RequestType,
        payload: Value,
    ) -> Result<Value, BridgeError> {
        let service_error = |e: ApiError| BridgeError::Service {
            service: request_type.as_str().to_string(),
            reason: e.to_string(),
        };
        match request_type {
            RequestType::ModulesToPackages => {
                let request: ModulesToPackagesRequest =
                    serde_json::from_value(payload).map_err(|e| invalid(request_type, e))?;
                let packages = self
                    .services
                    .modules_to_packages(request.modules)
                    .await
                    .map_err(|e| rate_limited_or(e, service_error))?;
                Ok(json!({ "packages": packages }))
            }
            RequestType::ChatCompletion => self
                .services
                .chat_completion(payload)
                .await
                .map_err(|e| rate_limited_or(e, service_error)),
            RequestType::FixError => {
                let request: FixErrorRequest =
                    serde_json::from_value(payload).map_err(|e| invalid(request_type, e))?;
                let fixed = self
                    .services
                    .fix_error(request.code, request.error)
                    .await
                    .map_err(|e| rate_limited_or(e, service_error))?;
                Ok(json!({ "code": fixed }))
            }
        }
    }

    async fn send(&self, message: HostMessage) -> Result<(), BridgeError> {
        let transport = self
            .transport
            .read()
            .await
            .clone()
            .ok_or(BridgeError::Detached)?;
        transport.deliver(&self.expected_origin, message).await
    }
}

fn invalid(request_type: RequestType, e: serde_json::Error) -> BridgeError {
    BridgeError::InvalidPayload {
        request_type: request_type.as_str().to_string(),
        reason: e.to_string(),
    }
}

fn rate_limited_or(e: ApiError, f: impl FnOnce(ApiError) -> BridgeError) -> BridgeError {
    match e {
        ApiError::RateLimited { .. } => BridgeError::Service {
            service: "rate_limit".to_string(),
            reason: USAGE_LIMIT_MESSAGE.to_string(),
        },
        other => f(other),
    }
}

fn service_error_message(e: &BridgeError) -> String {
    match e {
        BridgeError::Service { service, reason } if service == "rate_limit" => reason.clone(),
        other => other.to_string(),
    }
}

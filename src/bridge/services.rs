//! The host-side services the sandbox is allowed to call.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::api::PlatformClient;
use crate::error::ApiError;

/// Side-effects the sandbox cannot perform itself. The bridge host calls
/// these in response to sandbox requests; tests swap in scripted
/// implementations.
#[async_trait]
pub trait BridgeServices: Send + Sync + 'static {
    /// Resolve Python import names to installable package names.
    async fn modules_to_packages(&self, modules: Vec<String>) -> Result<Vec<String>, ApiError>;

    /// Forward a chat completion request verbatim and return the raw result.
    async fn chat_completion(&self, payload: Value) -> Result<Value, ApiError>;

    /// Ask the model for a corrected version of failing code.
    async fn fix_error(&self, code: String, error: String) -> Result<String, ApiError>;
}

const FIX_ERROR_PROMPT: &str = "You are given a Python script and the error it produced. \
Return the corrected script only, with no commentary.";

/// Production implementation backed by the platform API.
pub struct PlatformServices {
    client: PlatformClient,
}

impl PlatformServices {
    pub fn new(client: PlatformClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BridgeServices for PlatformServices {
    async fn modules_to_packages(&self, modules: Vec<String>) -> Result<Vec<String>, ApiError> {
        self.client.modules_to_packages(&modules).await
    }

    async fn chat_completion(&self, payload: Value) -> Result<Value, ApiError> {
        self.client.chat_completion(&payload).await
    }

    async fn fix_error(&self, code: String, error: String) -> Result<String, ApiError> {
        let payload = json!({
            "messages": [
                {"role": "system", "content": FIX_ERROR_PROMPT},
                {"role": "user", "content": format!("Script:\n{code}\n\nError:\n{error}")},
            ],
        });
        let response = self.client.chat_completion(&payload).await?;
        let content = response
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::InvalidResponse {
                endpoint: "/chat/completions".to_string(),
                reason: "chat completion result has no message content".to_string(),
            })?;
        Ok(content.to_string())
    }
}

//! Wire format of the sandbox bridge.
//!
//! Messages are JSON objects discriminated by a `type` field, matching what
//! the sandboxed runtime speaks. Field casing is part of the protocol:
//! message payloads use camelCase keys, request/response plumbing uses
//! snake_case.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages the host sends into the sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostMessage {
    #[serde(rename = "bee:updateState")]
    UpdateState {
        #[serde(rename = "stateChange")]
        state_change: StateChange,
    },
    #[serde(rename = "bee:response")]
    Response { request_id: String, payload: Value },
}

/// Messages the sandbox sends to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SandboxMessage {
    #[serde(rename = "bee:ready")]
    Ready,
    #[serde(rename = "bee:request")]
    Request {
        request_id: String,
        request_type: RequestType,
        payload: Value,
    },
}

/// Services the sandbox may ask the host to perform on its behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    ModulesToPackages,
    ChatCompletion,
    FixError,
}

impl RequestType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ModulesToPackages => "modules_to_packages",
            Self::ChatCompletion => "chat_completion",
            Self::FixError => "fix_error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    Dark,
}

/// Partial state pushed to the sandbox. Absent fields mean "unchanged".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateChange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fullscreen: Option<bool>,
    #[serde(rename = "ancestorOrigin", skip_serializing_if = "Option::is_none")]
    pub ancestor_origin: Option<String>,
}

impl StateChange {
    pub fn is_empty(&self) -> bool {
        self.code.is_none()
            && self.theme.is_none()
            && self.config.is_none()
            && self.fullscreen.is_none()
            && self.ancestor_origin.is_none()
    }

    /// Overlay another change on top of this one; `other`'s fields win.
    pub fn merge_from(&mut self, other: &StateChange) {
        if other.code.is_some() {
            self.code = other.code.clone();
        }
        if other.theme.is_some() {
            self.theme = other.theme;
        }
        if other.config.is_some() {
            self.config = other.config.clone();
        }
        if other.fullscreen.is_some() {
            self.fullscreen = other.fullscreen;
        }
        if other.ancestor_origin.is_some() {
            self.ancestor_origin = other.ancestor_origin.clone();
        }
    }
}

/// Payload of a `modules_to_packages` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModulesToPackagesRequest {
    pub modules: Vec<String>,
}

/// Payload of a `fix_error` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixErrorRequest {
    pub code: String,
    pub error: String,
}

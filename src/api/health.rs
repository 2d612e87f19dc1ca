//! Platform API connectivity probe used by the `doctor` CLI surface.

use std::error::Error as _;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;

/// Typed API health state for operator surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiHealthState {
    Healthy,
    InvalidUrl,
    DnsFailure,
    ConnectFailure,
    Timeout,
    AuthFailure,
    HttpFailure,
}

impl ApiHealthState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::InvalidUrl => "invalid_url",
            Self::DnsFailure => "dns_failure",
            Self::ConnectFailure => "connect_failure",
            Self::Timeout => "timeout",
            Self::AuthFailure => "auth_failure",
            Self::HttpFailure => "http_failure",
        }
    }

    pub fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// Probe result for the configured platform endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    pub url: String,
    pub state: ApiHealthState,
    pub detail: String,
    pub http_status: Option<u16>,
}

impl ApiHealth {
    pub fn is_healthy(&self) -> bool {
        self.state.is_healthy()
    }
}

/// Probe the platform API root and classify failures by URL/DNS/connect/auth.
pub async fn probe_api(config: &ApiConfig, timeout: Duration) -> ApiHealth {
    let url = config.base_url.clone();

    if reqwest::Url::parse(&url).is_err() {
        return ApiHealth {
            url,
            state: ApiHealthState::InvalidUrl,
            detail: "URL parse failed".to_string(),
            http_status: None,
        };
    }

    let client = match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(error) => {
            return ApiHealth {
                url,
                state: ApiHealthState::ConnectFailure,
                detail: format!("HTTP client init failed: {error}"),
                http_status: None,
            };
        }
    };

    match client.get(&url).header("Accept", "application/json").send().await {
        Ok(response) => {
            let status = response.status();
            let state = if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                ApiHealthState::AuthFailure
            } else if status.is_server_error() {
                ApiHealthState::HttpFailure
            } else {
                // 200/204/404/405 all count as "reachable": the API root is
                // not required to serve anything at /.
                ApiHealthState::Healthy
            };
            ApiHealth {
                url,
                state,
                detail: format!("HTTP {}", status.as_u16()),
                http_status: Some(status.as_u16()),
            }
        }
        Err(error) => ApiHealth {
            url,
            state: classify_transport_error(&error),
            detail: error.to_string(),
            http_status: None,
        },
    }
}

fn classify_transport_error(error: &reqwest::Error) -> ApiHealthState {
    if error.is_timeout() {
        return ApiHealthState::Timeout;
    }

    let mut source = error.source();
    while let Some(err) = source {
        if let Some(io_error) = err.downcast_ref::<std::io::Error>() {
            return match io_error.kind() {
                std::io::ErrorKind::NotFound => ApiHealthState::DnsFailure,
                std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::AddrNotAvailable => ApiHealthState::ConnectFailure,
                _ => ApiHealthState::ConnectFailure,
            };
        }
        source = err.source();
    }

    let lowered = error.to_string().to_ascii_lowercase();
    if lowered.contains("dns")
        || lowered.contains("lookup")
        || lowered.contains("name or service not known")
        || lowered.contains("no such host")
    {
        ApiHealthState::DnsFailure
    } else {
        ApiHealthState::ConnectFailure
    }
}

//! Configuration for beekit.
//!
//! Settings are loaded with priority: env var > TOML config file > default.
//! Secrets such as the API key additionally fall back to `~/.beekit/.env`
//! (loaded via dotenvy early in startup, see `bootstrap`).

pub(crate) mod helpers;

use std::net::SocketAddr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::error::ConfigError;
use crate::settings::Settings;

use self::helpers::{optional_env, parse_env};

/// Hard cap on upload size: 100 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Extensions the knowledge base can extract text from.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[
    "pdf", "txt", "md", "doc", "docx", "pptx", "csv", "json", "html",
];

/// Main configuration for the client runtime.
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub upload: UploadConfig,
    pub poll: PollConfig,
    pub bridge: BridgeConfig,
}

impl Config {
    /// Load configuration from env vars and the settings file.
    ///
    /// The standard `./.env` and `~/.beekit/.env` are loaded first (existing
    /// env vars are never overwritten), then the TOML settings file, then
    /// defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        crate::bootstrap::load_beekit_env();
        let settings = Settings::load();
        Self::from_settings(&settings)
    }

    /// Build config from an in-memory settings struct (shared by `load` and
    /// tests).
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            api: ApiConfig::resolve(settings)?,
            upload: UploadConfig::resolve(settings)?,
            poll: PollConfig::resolve(settings)?,
            bridge: BridgeConfig::resolve(settings)?,
        })
    }
}

/// Platform API connection config.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub timeout_ms: u64,
}

impl ApiConfig {
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:4000/v1";
    pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: SecretString::from(api_key.into()),
            timeout_ms: Self::DEFAULT_TIMEOUT_MS,
        }
    }

    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let base_url = optional_env("BEEKIT_API_BASE_URL")
            .or_else(|| settings.api_base_url.clone())
            .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string());

        if url::Url::parse(&base_url).is_err() {
            return Err(ConfigError::InvalidValue {
                key: "BEEKIT_API_BASE_URL".to_string(),
                message: format!("not a valid URL: '{base_url}'"),
            });
        }

        let api_key = optional_env("BEEKIT_API_KEY")
            .or_else(|| settings.api_key.clone())
            .unwrap_or_default();
        if api_key.is_empty() {
            tracing::debug!("No API key configured; authenticated calls will fail");
        }

        let timeout_ms = parse_env(
            "BEEKIT_API_TIMEOUT_MS",
            settings.api_timeout_ms.unwrap_or(Self::DEFAULT_TIMEOUT_MS),
        )?;
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "BEEKIT_API_TIMEOUT_MS".to_string(),
                message: "must be > 0".to_string(),
            });
        }

        Ok(Self {
            base_url,
            api_key: SecretString::from(api_key),
            timeout_ms,
        })
    }

    /// Fail fast before an operation that needs authentication.
    pub fn require_key(&self) -> Result<(), ConfigError> {
        if self.api_key.expose_secret().is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "BEEKIT_API_KEY".to_string(),
                hint: "Set the env var or add api_key to ~/.beekit/config.toml".to_string(),
            });
        }
        Ok(())
    }
}

/// Upload validation config.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_file_bytes: u64,
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: MAX_UPLOAD_BYTES,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl UploadConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let max_file_bytes = parse_env(
            "BEEKIT_MAX_FILE_BYTES",
            settings.max_file_bytes.unwrap_or(MAX_UPLOAD_BYTES),
        )?;
        if max_file_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "BEEKIT_MAX_FILE_BYTES".to_string(),
                message: "must be > 0".to_string(),
            });
        }

        let allowed_extensions = optional_env("BEEKIT_ALLOWED_EXTENSIONS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().trim_start_matches('.').to_ascii_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .or_else(|| settings.allowed_extensions.clone())
            .unwrap_or_else(|| {
                DEFAULT_ALLOWED_EXTENSIONS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });
        if allowed_extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "BEEKIT_ALLOWED_EXTENSIONS".to_string(),
                message: "allow-list must not be empty".to_string(),
            });
        }

        Ok(Self {
            max_file_bytes,
            allowed_extensions,
        })
    }
}

/// Pending-resource polling config.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub duration_start: Duration,
    pub increase_step: Duration,
    pub count_without_increase: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            duration_start: Duration::from_millis(1000),
            increase_step: Duration::from_millis(200),
            count_without_increase: 10,
        }
    }
}

impl PollConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let duration_start_ms = parse_env(
            "BEEKIT_POLL_DURATION_START_MS",
            settings
                .poll_duration_start_ms
                .unwrap_or(defaults.duration_start.as_millis() as u64),
        )?;
        if duration_start_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "BEEKIT_POLL_DURATION_START_MS".to_string(),
                message: "must be > 0".to_string(),
            });
        }

        let increase_step_ms = parse_env(
            "BEEKIT_POLL_INCREASE_STEP_MS",
            settings
                .poll_increase_step_ms
                .unwrap_or(defaults.increase_step.as_millis() as u64),
        )?;

        let count_without_increase = parse_env(
            "BEEKIT_POLL_COUNT_WITHOUT_INCREASE",
            settings
                .poll_count_without_increase
                .unwrap_or(defaults.count_without_increase),
        )?;

        Ok(Self {
            duration_start: Duration::from_millis(duration_start_ms),
            increase_step: Duration::from_millis(increase_step_ms),
            count_without_increase,
        })
    }
}

/// Sandboxed app bridge config.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// The only origin whose messages the host will process.
    pub sandbox_origin: String,
    /// Bind address for the WebSocket bridge endpoint.
    pub listen_addr: SocketAddr,
    /// Token the sandbox runner must present to connect.
    pub auth_token: Option<SecretString>,
}

impl BridgeConfig {
    pub const DEFAULT_SANDBOX_ORIGIN: &'static str = "http://localhost:4201";
    pub const DEFAULT_LISTEN_ADDR: &'static str = "127.0.0.1:8930";

    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let sandbox_origin = optional_env("BEEKIT_SANDBOX_ORIGIN")
            .or_else(|| settings.sandbox_origin.clone())
            .unwrap_or_else(|| Self::DEFAULT_SANDBOX_ORIGIN.to_string());

        let listen_raw = optional_env("BEEKIT_BRIDGE_ADDR")
            .or_else(|| settings.bridge_listen_addr.clone())
            .unwrap_or_else(|| Self::DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_raw
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                key: "BEEKIT_BRIDGE_ADDR".to_string(),
                message: format!("not a socket address: {e}"),
            })?;

        let auth_token = optional_env("BEEKIT_BRIDGE_TOKEN")
            .or_else(|| settings.bridge_auth_token.clone())
            .map(SecretString::from);

        Ok(Self {
            sandbox_origin,
            listen_addr,
            auth_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_beekit_env() {
        // SAFETY: Guarded by ENV_MUTEX in tests.
        unsafe {
            std::env::remove_var("BEEKIT_API_BASE_URL");
            std::env::remove_var("BEEKIT_API_KEY");
            std::env::remove_var("BEEKIT_API_TIMEOUT_MS");
            std::env::remove_var("BEEKIT_MAX_FILE_BYTES");
            std::env::remove_var("BEEKIT_ALLOWED_EXTENSIONS");
            std::env::remove_var("BEEKIT_POLL_DURATION_START_MS");
            std::env::remove_var("BEEKIT_POLL_INCREASE_STEP_MS");
            std::env::remove_var("BEEKIT_POLL_COUNT_WITHOUT_INCREASE");
            std::env::remove_var("BEEKIT_SANDBOX_ORIGIN");
            std::env::remove_var("BEEKIT_BRIDGE_ADDR");
            std::env::remove_var("BEEKIT_BRIDGE_TOKEN");
        }
    }

    #[test]
    fn resolvers_use_safe_defaults() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_beekit_env();

        let config = Config::from_settings(&Settings::default()).expect("config resolve");
        assert_eq!(config.api.base_url, ApiConfig::DEFAULT_BASE_URL);
        assert_eq!(config.upload.max_file_bytes, MAX_UPLOAD_BYTES);
        assert!(config.upload.allowed_extensions.contains(&"pdf".to_string()));
        assert_eq!(config.poll.duration_start, Duration::from_millis(1000));
        assert_eq!(config.poll.increase_step, Duration::from_millis(200));
        assert_eq!(config.poll.count_without_increase, 10);
        assert_eq!(
            config.bridge.sandbox_origin,
            BridgeConfig::DEFAULT_SANDBOX_ORIGIN
        );
        assert!(config.bridge.auth_token.is_none());
    }

    #[test]
    fn resolvers_apply_env_overrides() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_beekit_env();

        // SAFETY: Guarded by ENV_MUTEX in tests.
        unsafe {
            std::env::set_var("BEEKIT_API_BASE_URL", "https://api.example.test/v1");
            std::env::set_var("BEEKIT_ALLOWED_EXTENSIONS", ".PDF, txt,,md");
            std::env::set_var("BEEKIT_POLL_DURATION_START_MS", "250");
        }

        let mut settings = Settings::default();
        settings.poll_count_without_increase = Some(3);

        let config = Config::from_settings(&settings).expect("config resolve");
        assert_eq!(config.api.base_url, "https://api.example.test/v1");
        assert_eq!(
            config.upload.allowed_extensions,
            vec!["pdf".to_string(), "txt".to_string(), "md".to_string()]
        );
        assert_eq!(config.poll.duration_start, Duration::from_millis(250));
        assert_eq!(config.poll.count_without_increase, 3);

        clear_beekit_env();
    }

    #[test]
    fn resolvers_reject_invalid_values() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_beekit_env();

        // SAFETY: Guarded by ENV_MUTEX in tests.
        unsafe {
            std::env::set_var("BEEKIT_API_BASE_URL", "not a url");
        }
        let err = Config::from_settings(&Settings::default()).unwrap_err();
        match err {
            ConfigError::InvalidValue { key, .. } => assert_eq!(key, "BEEKIT_API_BASE_URL"),
            other => panic!("unexpected error: {other}"),
        }

        clear_beekit_env();
    }

    #[test]
    fn require_key_rejects_empty_key() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_beekit_env();

        let config = ApiConfig::resolve(&Settings::default()).expect("api resolve");
        assert!(config.require_key().is_err());

        let config = ApiConfig::new("http://localhost:4000/v1", "bk_test");
        assert!(config.require_key().is_ok());
    }
}

//! On-disk settings file for beekit.
//!
//! `~/.beekit/config.toml` holds everything a user would rather not pass as
//! env vars; a project-local `beekit.toml` in the working directory overlays
//! it. Every field is optional; `Config` resolution fills gaps with env vars
//! first, then these settings, then defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Raw settings as parsed from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_base_url: Option<String>,
    pub api_key: Option<String>,
    pub api_timeout_ms: Option<u64>,

    pub max_file_bytes: Option<u64>,
    pub allowed_extensions: Option<Vec<String>>,

    pub poll_duration_start_ms: Option<u64>,
    pub poll_increase_step_ms: Option<u64>,
    pub poll_count_without_increase: Option<u32>,

    pub sandbox_origin: Option<String>,
    pub bridge_listen_addr: Option<String>,
    pub bridge_auth_token: Option<String>,
}

impl Settings {
    /// Default settings file path: `~/.beekit/config.toml`.
    pub fn default_toml_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".beekit")
            .join("config.toml")
    }

    /// Project-local overlay file, resolved against the working directory.
    pub const LOCAL_TOML_FILE: &'static str = "beekit.toml";

    /// Load settings from the default path with the project-local overlay,
    /// falling back to defaults when the files are missing or unreadable.
    pub fn load() -> Self {
        Self::load_layered(&Self::default_toml_path(), Path::new(Self::LOCAL_TOML_FILE))
    }

    /// Load `base`, then overlay `local` on top (its values win).
    pub fn load_layered(base: &Path, local: &Path) -> Self {
        let mut settings = match Self::load_toml(base) {
            Ok(Some(settings)) => settings,
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!("Failed to load settings file, using defaults: {}", e);
                Self::default()
            }
        };
        match Self::load_toml(local) {
            Ok(Some(overlay)) => settings.merge_from(&overlay),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Failed to load {}, ignoring it: {}", local.display(), e);
            }
        }
        settings
    }

    /// Load a TOML settings file. Returns `Ok(None)` if the file is absent.
    pub fn load_toml(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        let parsed = toml::from_str(&content).map_err(|e| {
            ConfigError::ParseError(format!("{}: {}", path.display(), e))
        })?;
        Ok(Some(parsed))
    }

    /// Merge another settings struct into this one; `other`'s values win.
    pub fn merge_from(&mut self, other: &Settings) {
        macro_rules! overlay {
            ($($field:ident),* $(,)?) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field.clone();
                })*
            };
        }
        overlay!(
            api_base_url,
            api_key,
            api_timeout_ms,
            max_file_bytes,
            allowed_extensions,
            poll_duration_start_ms,
            poll_increase_step_ms,
            poll_count_without_increase,
            sandbox_origin,
            bridge_listen_addr,
            bridge_auth_token,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_toml_missing_file_is_none() {
        let dir = tempdir().unwrap();
        let loaded = Settings::load_toml(&dir.path().join("config.toml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn load_toml_parses_partial_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
api_base_url = "https://api.example.test/v1"
poll_duration_start_ms = 500
allowed_extensions = ["pdf", "txt"]
"#,
        )
        .unwrap();

        let settings = Settings::load_toml(&path).unwrap().unwrap();
        assert_eq!(
            settings.api_base_url.as_deref(),
            Some("https://api.example.test/v1")
        );
        assert_eq!(settings.poll_duration_start_ms, Some(500));
        assert_eq!(
            settings.allowed_extensions,
            Some(vec!["pdf".to_string(), "txt".to_string()])
        );
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn load_toml_rejects_invalid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api_base_url = [broken").unwrap();

        let err = Settings::load_toml(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn merge_from_prefers_other_values() {
        let mut base = Settings {
            api_base_url: Some("https://old.example/v1".to_string()),
            api_timeout_ms: Some(10_000),
            ..Default::default()
        };
        let overlay = Settings {
            api_base_url: Some("https://new.example/v1".to_string()),
            max_file_bytes: Some(1024),
            ..Default::default()
        };

        base.merge_from(&overlay);
        assert_eq!(base.api_base_url.as_deref(), Some("https://new.example/v1"));
        assert_eq!(base.api_timeout_ms, Some(10_000));
        assert_eq!(base.max_file_bytes, Some(1024));
    }

    #[test]
    fn layered_load_prefers_the_local_file() {
        let dir = tempdir().unwrap();
        let home = dir.path().join("config.toml");
        let local = dir.path().join("beekit.toml");
        std::fs::write(
            &home,
            "api_base_url = \"https://home.example/v1\"\napi_timeout_ms = 9000\n",
        )
        .unwrap();
        std::fs::write(&local, "api_base_url = \"https://project.example/v1\"\n").unwrap();

        let settings = Settings::load_layered(&home, &local);
        assert_eq!(
            settings.api_base_url.as_deref(),
            Some("https://project.example/v1")
        );
        assert_eq!(settings.api_timeout_ms, Some(9000));
    }

    #[test]
    fn layered_load_tolerates_missing_files() {
        let dir = tempdir().unwrap();
        let settings = Settings::load_layered(
            &dir.path().join("config.toml"),
            &dir.path().join("beekit.toml"),
        );
        assert!(settings.api_base_url.is_none());
    }
}

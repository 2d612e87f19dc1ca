//! Shared helpers for config resolution.

use crate::error::ConfigError;

/// Read an optional env var, treating empty/whitespace values as unset.
pub(crate) fn optional_env(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Err(_) => None,
    }
}

/// Parse an env var (or fall back) into a number, with a typed error on junk.
pub(crate) fn parse_env<T>(key: &str, fallback: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("must be a valid number: {e}"),
        }),
        None => Ok(fallback),
    }
}

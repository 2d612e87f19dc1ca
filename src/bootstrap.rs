//! Bootstrap helpers for beekit.
//!
//! Secrets and connection vars can live in `~/.beekit/.env` so they are
//! available before (and independent of) the TOML settings file. Loaded via
//! dotenvy, which never overwrites existing env vars.

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

/// Path to the beekit-specific `.env` file: `~/.beekit/.env`.
pub fn beekit_env_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".beekit")
        .join(".env")
}

/// Load env vars from `~/.beekit/.env` (in addition to the standard `.env`).
///
/// Call this **after** `dotenvy::dotenv()` so that the standard `./.env`
/// takes priority. Effective priority:
///
///   explicit env vars > `./.env` > `~/.beekit/.env`
pub fn load_beekit_env() {
    let path = beekit_env_path();
    if path.exists() {
        let _ = dotenvy::from_path(&path);
    }
}

/// Write vars to `~/.beekit/.env`, creating the parent directory if needed.
///
/// Values are double-quoted so `#` and other shell-special characters are
/// preserved by dotenvy; quotes and backslashes are escaped to prevent a
/// value from injecting extra vars.
pub fn save_bootstrap_env(vars: &[(&str, &str)]) -> std::io::Result<()> {
    let path = beekit_env_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut content = String::new();
    for (key, value) in vars {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        content.push_str(&format!("{}=\"{}\"\n", key, escaped));
    }
    std::fs::write(&path, content)
}

/// Initialize tracing for the CLI binary.
///
/// `RUST_LOG` wins; the default keeps beekit at info and dependencies quiet.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("beekit=info,warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

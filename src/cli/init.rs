//! `beekit init` - persist credentials to `~/.beekit/.env`.

use crate::bootstrap::{beekit_env_path, save_bootstrap_env};

pub fn run_init_command(api_key: String, base_url: Option<String>) -> anyhow::Result<()> {
    if api_key.trim().is_empty() {
        anyhow::bail!("--api-key must not be empty");
    }

    let mut vars = vec![("BEEKIT_API_KEY", api_key.as_str())];
    if let Some(url) = base_url.as_deref() {
        // Catch typos before they are persisted.
        url::Url::parse(url)
            .map_err(|e| anyhow::anyhow!("invalid base URL '{url}': {e}"))?;
        vars.push(("BEEKIT_API_BASE_URL", url));
    }

    save_bootstrap_env(&vars)?;
    println!("  wrote {}", beekit_env_path().display());
    Ok(())
}

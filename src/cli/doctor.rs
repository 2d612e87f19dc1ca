//! `beekit doctor` - active health diagnostics.
//!
//! Probes the platform API and validates configuration to surface problems
//! before they bite during normal operation. Each check reports pass/fail
//! with actionable guidance on failures.

use std::time::Duration;

use secrecy::ExposeSecret;

use crate::api::{probe_api, ApiHealthState};
use crate::bootstrap::beekit_env_path;
use crate::config::Config;
use crate::settings::Settings;

enum CheckResult {
    Pass(String),
    Fail(String),
    Skip(String),
}

/// Run diagnostic checks and print results.
pub async fn run_doctor_command(strict: bool) -> anyhow::Result<()> {
    println!("Beekit Doctor");
    println!("=============\n");

    let mut passed = 0u32;
    let mut failed = 0u32;

    let config = Config::load();

    check("Settings file", check_settings_file(), &mut passed, &mut failed);
    check("Env file", check_env_file(), &mut passed, &mut failed);

    match &config {
        Ok(config) => {
            check("API key", check_api_key(config), &mut passed, &mut failed);
            check(
                "Platform API reachability",
                check_api_reachability(config).await,
                &mut passed,
                &mut failed,
            );
            check(
                "Bridge listen address",
                check_bridge_addr(config).await,
                &mut passed,
                &mut failed,
            );
        }
        Err(e) => {
            check(
                "Configuration",
                CheckResult::Fail(format!("failed to load: {e}")),
                &mut passed,
                &mut failed,
            );
        }
    }

    println!();
    println!("  {passed} passed, {failed} failed");

    if failed > 0 {
        println!("\n  Some checks failed. This is normal if you don't use those features.");
        if strict {
            anyhow::bail!("{failed} doctor check(s) failed");
        }
    }
    Ok(())
}

fn check(name: &str, result: CheckResult, passed: &mut u32, failed: &mut u32) {
    match result {
        CheckResult::Pass(detail) => {
            *passed += 1;
            println!("  [pass] {name}: {detail}");
        }
        CheckResult::Fail(detail) => {
            *failed += 1;
            println!("  [FAIL] {name}: {detail}");
        }
        CheckResult::Skip(reason) => {
            println!("  [skip] {name}: {reason}");
        }
    }
}

fn check_settings_file() -> CheckResult {
    let path = Settings::default_toml_path();
    if !path.exists() {
        return CheckResult::Skip(format!("{} not present, using defaults", path.display()));
    }
    match Settings::load_toml(&path) {
        Ok(_) => CheckResult::Pass(format!("{} parsed", path.display())),
        Err(e) => CheckResult::Fail(format!("{}: {e}", path.display())),
    }
}

fn check_env_file() -> CheckResult {
    let path = beekit_env_path();
    if path.exists() {
        CheckResult::Pass(format!("{} present", path.display()))
    } else {
        CheckResult::Skip(format!("{} not present", path.display()))
    }
}

fn check_api_key(config: &Config) -> CheckResult {
    if config.api.api_key.expose_secret().is_empty() {
        CheckResult::Fail(
            "BEEKIT_API_KEY is not set; uploads and bridge services will fail auth".to_string(),
        )
    } else {
        CheckResult::Pass("BEEKIT_API_KEY is set".to_string())
    }
}

async fn check_api_reachability(config: &Config) -> CheckResult {
    let health = probe_api(&config.api, Duration::from_secs(5)).await;
    match health.state {
        ApiHealthState::Healthy => CheckResult::Pass(format!("{} reachable", config.api.base_url)),
        ApiHealthState::AuthFailure => CheckResult::Fail(format!(
            "{} reachable but rejected the API key",
            config.api.base_url
        )),
        other => CheckResult::Fail(format!(
            "{}: {:?} ({})",
            config.api.base_url, other, health.detail
        )),
    }
}

async fn check_bridge_addr(config: &Config) -> CheckResult {
    match tokio::net::TcpListener::bind(config.bridge.listen_addr).await {
        Ok(_) => CheckResult::Pass(format!("{} bindable", config.bridge.listen_addr)),
        Err(e) => CheckResult::Fail(format!("{}: {e}", config.bridge.listen_addr)),
    }
}

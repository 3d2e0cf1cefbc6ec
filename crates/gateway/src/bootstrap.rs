//! AppState construction shared by the `serve` command and tooling.

use std::sync::Arc;

use anyhow::Context;

use sl_domain::config::{Config, ConfigSeverity};
use sl_platform::{DeviceApiClient, IdentityClient, ServiceAccount, TokenCache};

use crate::state::AppState;

/// Read a required secret from the environment variable named in config.
fn required_env(var: &str, what: &str) -> anyhow::Result<String> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => anyhow::bail!("{what}: environment variable {var} is not set"),
    }
}

/// Validate config, load secrets, and wire every subsystem into a
/// fully-initialized [`AppState`].
///
/// A missing secret or invalid config is fatal here, at startup — it is
/// never surfaced as a per-request error.
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Secrets (read once, process lifetime) ────────────────────────
    let signature_secret = required_env(&config.connector.secret_env, "signature secret")?;
    let account = ServiceAccount {
        email: required_env(&config.auth.email_env, "service account email")?,
        key_id: required_env(&config.auth.key_id_env, "service account key id")?,
        secret: required_env(&config.auth.secret_env, "service account secret")?,
    };

    // ── Token cache ──────────────────────────────────────────────────
    let identity =
        IdentityClient::new(&config.auth, account).context("initializing identity client")?;
    let tokens = Arc::new(TokenCache::new(
        Arc::new(identity),
        config.auth.safety_margin_secs,
    ));
    tracing::info!(endpoint = %config.auth.endpoint, "token cache ready");

    // ── Device API client ────────────────────────────────────────────
    let devices =
        Arc::new(DeviceApiClient::new(&config.platform).context("initializing device API client")?);
    let base_url = if config.platform.use_emulator {
        &config.platform.emulator_base_url
    } else {
        &config.platform.api_base_url
    };
    tracing::info!(
        base_url = %base_url,
        emulated = config.platform.use_emulator,
        "device API client ready"
    );

    Ok(AppState {
        config,
        signature_secret: Arc::new(signature_secret),
        tokens,
        devices,
    })
}

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Identity endpoint (OAuth2 client credentials)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Settings for the OAuth2 client-credentials exchange.
///
/// The service-account credential values themselves are never stored in the
/// config file — the `*_env` fields name the environment variables they are
/// read from, once, at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Token endpoint of the platform's identity service
    /// (e.g. `https://identity.platform.example/oauth2/token`).
    #[serde(default)]
    pub endpoint: String,
    /// Environment variable holding the service-account email.
    #[serde(default = "d_email_env")]
    pub email_env: String,
    /// Environment variable holding the service-account key id.
    #[serde(default = "d_key_id_env")]
    pub key_id_env: String,
    /// Environment variable holding the service-account secret.
    #[serde(default = "d_secret_env")]
    pub secret_env: String,
    /// A cached token is refreshed once fewer than this many seconds remain
    /// before its expiry.
    #[serde(default = "d_safety_margin")]
    pub safety_margin_secs: i64,
    /// Lifetime of the signed grant assertion sent to the identity endpoint.
    #[serde(default = "d_assertion_ttl")]
    pub assertion_ttl_secs: i64,
    #[serde(default = "d_8000")]
    pub timeout_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            email_env: d_email_env(),
            key_id_env: d_key_id_env(),
            secret_env: d_secret_env(),
            safety_margin_secs: d_safety_margin(),
            assertion_ttl_secs: d_assertion_ttl(),
            timeout_ms: 8000,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_email_env() -> String {
    "SL_SA_EMAIL".into()
}

fn d_key_id_env() -> String {
    "SL_SA_KEY_ID".into()
}

fn d_secret_env() -> String {
    "SL_SA_SECRET".into()
}

fn d_safety_margin() -> i64 {
    300
}

fn d_assertion_ttl() -> i64 {
    3600
}

fn d_8000() -> u64 {
    8000
}

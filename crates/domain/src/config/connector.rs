use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Data Connector (inbound webhook) settings
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Header carrying the delivery's signature token.
    #[serde(default = "d_signature_header")]
    pub signature_header: String,
    /// Environment variable holding the shared signature secret.
    #[serde(default = "d_secret_env")]
    pub secret_env: String,
    /// Clock-skew allowance when validating the signature token's expiry.
    #[serde(default = "d_leeway")]
    pub replay_leeway_secs: u64,
    /// Wall-clock ceiling for the downstream work of one delivery (token
    /// fetch + outbound call, including retries). Keep this below the
    /// sender's own delivery timeout.
    #[serde(default = "d_budget")]
    pub budget_ms: u64,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            signature_header: d_signature_header(),
            secret_env: d_secret_env(),
            replay_leeway_secs: d_leeway(),
            budget_ms: d_budget(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_signature_header() -> String {
    "x-connector-signature".into()
}

fn d_secret_env() -> String {
    "SL_SIGNATURE_SECRET".into()
}

fn d_leeway() -> u64 {
    30
}

fn d_budget() -> u64 {
    25_000
}

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Platform API connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Connection settings for the sensor platform's REST API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Base URL of the production device API
    /// (e.g. `https://api.platform.example/v2`).
    #[serde(default)]
    pub api_base_url: String,
    /// Base URL of the device emulator API, used when `use_emulator` is set.
    #[serde(default)]
    pub emulator_base_url: String,
    /// Route outbound mutations to the emulator instead of the production
    /// API. Intended for test and staging projects.
    #[serde(default)]
    pub use_emulator: bool,
    #[serde(default = "d_8000")]
    pub timeout_ms: u64,
    /// Additional attempts after the first on transient failures.
    #[serde(default = "d_2")]
    pub max_retries: u32,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            emulator_base_url: String::new(),
            use_emulator: false,
            timeout_ms: 8000,
            max_retries: 2,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_8000() -> u64 {
    8000
}

fn d_2() -> u32 {
    2
}

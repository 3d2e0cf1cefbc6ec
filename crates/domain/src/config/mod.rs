mod auth;
mod connector;
mod observability;
mod platform;
mod server;

pub use auth::*;
pub use connector::*;
pub use observability::*;
pub use platform::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub connector: ConnectorConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Structural checks only — secrets live in the environment and are
    /// checked at startup by the gateway bootstrap.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut issues = Vec::new();

        let mut error = |field: &str, message: String| {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: field.into(),
                message,
            });
        };

        if self.platform.use_emulator {
            if self.platform.emulator_base_url.trim().is_empty() {
                error(
                    "platform.emulator_base_url",
                    "required when use_emulator is enabled".into(),
                );
            }
        } else if self.platform.api_base_url.trim().is_empty() {
            error("platform.api_base_url", "must be set".into());
        }

        for (field, value) in [
            ("platform.api_base_url", &self.platform.api_base_url),
            ("platform.emulator_base_url", &self.platform.emulator_base_url),
            ("auth.endpoint", &self.auth.endpoint),
        ] {
            if !value.trim().is_empty() && !value.starts_with("http") {
                error(field, format!("'{value}' does not look like a URL"));
            }
        }

        if self.auth.endpoint.trim().is_empty() {
            error("auth.endpoint", "must be set".into());
        }

        if self.platform.timeout_ms == 0 {
            error("platform.timeout_ms", "must be greater than zero".into());
        }

        if self.connector.signature_header.trim().is_empty() {
            error("connector.signature_header", "must be set".into());
        }

        if self.connector.budget_ms == 0 {
            error("connector.budget_ms", "must be greater than zero".into());
        }

        for (field, value) in [
            ("connector.secret_env", &self.connector.secret_env),
            ("auth.email_env", &self.auth.email_env),
            ("auth.key_id_env", &self.auth.key_id_env),
            ("auth.secret_env", &self.auth.secret_env),
        ] {
            if value.trim().is_empty() {
                error(field, "must name an environment variable".into());
            }
        }

        if self.platform.max_retries > 5 {
            issues.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "platform.max_retries".into(),
                message: format!(
                    "{} retries may exceed the sender's delivery window",
                    self.platform.max_retries
                ),
            });
        }

        issues
    }
}

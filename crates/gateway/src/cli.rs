//! Command-line interface and config loading.

use clap::{Parser, Subcommand};

use sl_domain::config::{Config, ConfigSeverity};

/// sensorlink — forwards Data Connector telemetry events to the platform
/// API as device label updates.
#[derive(Debug, Parser)]
#[command(name = "sensorlink", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the webhook service (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Validate the configuration and report issues.
    Validate,
    /// Print the effective configuration (secrets stay in the environment).
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `SL_CONFIG` (or
/// `config.toml` by default). Returns the parsed [`Config`] and the path
/// that was used. A missing file yields the built-in defaults.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("SL_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        Config::default()
    };

    Ok((config, config_path))
}

/// Print validation results for `config`; returns `false` when any issue
/// is an error.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();
    if issues.is_empty() {
        println!("{config_path}: OK");
        return true;
    }
    for issue in &issues {
        println!("{issue}");
    }
    !issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Error)
}

/// Print the effective configuration as TOML.
pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => eprintln!("failed to render config: {e}"),
    }
}

//! Logging initialization for the peersync CLI.
//!
//! Configures `tracing-subscriber` from the `[general]` section of
//! `PeersyncConfig`. Log lines go to stderr so that command output on
//! stdout stays machine-readable.

use std::path::Path;

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use peersync_core::config::{GeneralConfig, PeersyncConfig};

/// Resolve logging settings before the subscriber exists.
///
/// A missing or broken config file falls back to defaults; the command
/// itself reports the config error afterwards. `--log-level` wins over the file.
pub async fn resolve_general(config_path: &Path, log_level: Option<&str>) -> GeneralConfig {
    let mut general = PeersyncConfig::load(config_path)
        .await
        .map(|c| c.general)
        .unwrap_or_default();
    if let Some(level) = log_level {
        general.log_level = level.to_owned();
    }
    general
}

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any command runs.
///
/// # Formats
///
/// * `"json"` - Machine-parseable JSON lines
/// * `"pretty"` - Human-readable colored output
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize JSON tracing subscriber: {}", e)
                })?;
        }
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(std::io::stderr),
                )
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize pretty tracing subscriber: {}", e)
                })?;
        }
        _ => {
            return Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                config.log_format
            ));
        }
    }

    Ok(())
}

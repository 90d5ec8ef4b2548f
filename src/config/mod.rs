//! Configuration system for meshscope
//!
//! A single YAML file under the platform config directory, overlaid with
//! environment overrides. Keys use dot notation for `config get` and
//! `config set`.

pub mod loader;
pub mod paths;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{Config, EndpointsConfig, TopConfig};

use anyhow::{Context, Result};

/// Keys accepted by `get_config_value` and `set_config_value`
pub const CONFIG_KEYS: &[&str] = &[
    "apiAddress",
    "defaultNamespace",
    "timeWindow",
    "output",
    "top.tickIntervalMs",
    "top.hideSources",
    "top.queueCapacity",
    "top.pendingTtlSecs",
    "top.maxRps",
    "endpoints.timeoutSecs",
];

/// Get a configuration value by key (dot notation)
pub fn get_config_value(config: &Config, key: &str) -> Result<String> {
    match key {
        "apiAddress" => Ok(config.api_address.clone()),
        "defaultNamespace" => Ok(config.default_namespace.clone().unwrap_or_default()),
        "timeWindow" => Ok(config.time_window.clone()),
        "output" => Ok(config.output.clone()),
        "top.tickIntervalMs" => Ok(config.top.tick_interval_ms.to_string()),
        "top.hideSources" => Ok(config.top.hide_sources.to_string()),
        "top.queueCapacity" => Ok(config.top.queue_capacity.to_string()),
        "top.pendingTtlSecs" => Ok(config
            .top
            .pending_ttl_secs
            .map(|secs| secs.to_string())
            .unwrap_or_default()),
        "top.maxRps" => Ok(config.top.max_rps.to_string()),
        "endpoints.timeoutSecs" => Ok(config.endpoints.timeout_secs.to_string()),
        _ => Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }
}

/// Set a configuration value by key (dot notation)
///
/// An empty value clears optional keys. The result is validated before it
/// is returned, so an invalid value never reaches disk.
pub fn set_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "apiAddress" => config.api_address = value.to_string(),
        "defaultNamespace" => {
            config.default_namespace = (!value.is_empty()).then(|| value.to_string());
        }
        "timeWindow" => config.time_window = value.to_string(),
        "output" => config.output = value.to_string(),
        "top.tickIntervalMs" => {
            config.top.tick_interval_ms = value
                .parse()
                .context("top.tickIntervalMs must be a number")?;
        }
        "top.hideSources" => {
            config.top.hide_sources = value
                .parse()
                .context("top.hideSources must be 'true' or 'false'")?;
        }
        "top.queueCapacity" => {
            config.top.queue_capacity = value
                .parse()
                .context("top.queueCapacity must be a number")?;
        }
        "top.pendingTtlSecs" => {
            config.top.pending_ttl_secs = if value.is_empty() {
                None
            } else {
                Some(
                    value
                        .parse()
                        .context("top.pendingTtlSecs must be a number")?,
                )
            };
        }
        "top.maxRps" => {
            config.top.max_rps = value.parse().context("top.maxRps must be a number")?;
        }
        "endpoints.timeoutSecs" => {
            config.endpoints.timeout_secs = value
                .parse()
                .context("endpoints.timeoutSecs must be a number")?;
        }
        _ => return Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }

    config.validate()
}

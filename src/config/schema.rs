//! Configuration schema definitions
//!
//! Defines the structure of the configuration file using serde. Keys are
//! camelCase in YAML.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::request::{OutputFormat, parse_time_window};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Metrics API base address
    #[serde(default = "default_api_address")]
    pub api_address: String,

    /// Namespace used when `--namespace` is not given; falls back to the
    /// kubeconfig context's namespace when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_namespace: Option<String>,

    /// Stats time window (e.g. "1m")
    #[serde(default = "default_time_window")]
    pub time_window: String,

    /// Batch output format: table, wide or json
    #[serde(default = "default_output")]
    pub output: String,

    /// Live table settings
    #[serde(default)]
    pub top: TopConfig,

    /// Endpoint discovery settings
    #[serde(default)]
    pub endpoints: EndpointsConfig,
}

/// Live table configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopConfig {
    /// Redraw interval in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Group rows without the source column
    #[serde(default)]
    pub hide_sources: bool,

    /// Capacity of the completed-exchange queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Drop half-open exchanges after this many seconds; unset keeps them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_ttl_secs: Option<u64>,

    /// Maximum requests per second to tap
    #[serde(default = "default_max_rps")]
    pub max_rps: f64,
}

/// Endpoint discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointsConfig {
    /// Wall-clock budget for a discovery round
    #[serde(default = "default_endpoints_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_address() -> String {
    "http://localhost:8085".to_string()
}

fn default_time_window() -> String {
    "1m".to_string()
}

fn default_output() -> String {
    OutputFormat::Table.to_string()
}

fn default_tick_interval_ms() -> u64 {
    100
}

fn default_queue_capacity() -> usize {
    256
}

fn default_max_rps() -> f64 {
    100.0
}

fn default_endpoints_timeout_secs() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_address: default_api_address(),
            default_namespace: None,
            time_window: default_time_window(),
            output: default_output(),
            top: TopConfig::default(),
            endpoints: EndpointsConfig::default(),
        }
    }
}

impl Default for TopConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            hide_sources: false,
            queue_capacity: default_queue_capacity(),
            pending_ttl_secs: None,
            max_rps: default_max_rps(),
        }
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_endpoints_timeout_secs(),
        }
    }
}

impl Config {
    /// Check values that parse as YAML but would be rejected at use
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api_address)
            .with_context(|| format!("apiAddress \"{}\" is not a valid URL", self.api_address))?;
        parse_time_window(&self.time_window).context("timeWindow is invalid")?;
        self.output
            .parse::<OutputFormat>()
            .context("output is invalid")?;

        if self.top.tick_interval_ms == 0 {
            anyhow::bail!("top.tickIntervalMs must be greater than zero");
        }
        if self.top.queue_capacity == 0 {
            anyhow::bail!("top.queueCapacity must be greater than zero");
        }
        if self.top.max_rps.is_nan() || self.top.max_rps <= 0.0 {
            anyhow::bail!("top.maxRps must be greater than zero");
        }
        if self.top.pending_ttl_secs == Some(0) {
            anyhow::bail!("top.pendingTtlSecs must be greater than zero when set");
        }
        if self.endpoints.timeout_secs == 0 {
            anyhow::bail!("endpoints.timeoutSecs must be greater than zero");
        }
        Ok(())
    }
}

//! Configuration loading
//!
//! Precedence (highest to lowest):
//! 1. Environment variable overrides
//! 2. Root config file
//! 3. Built-in defaults
//!
//! Command-line flags override the loaded configuration per invocation.

use super::{paths, schema::Config};
use anyhow::{Context, Result};
use std::path::Path;

/// Overrides `apiAddress`
pub const API_ADDRESS_ENV: &str = "MESHSCOPE_API_ADDRESS";
/// Overrides `defaultNamespace`
pub const NAMESPACE_ENV: &str = "MESHSCOPE_NAMESPACE";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the root configuration with environment overrides applied
    pub fn load() -> Result<Config> {
        Self::load_from(&paths::root_config_path())
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist
    ///
    /// The merged result is validated, so every command sees only values
    /// that are usable as-is.
    pub fn load_from(path: &Path) -> Result<Config> {
        let config = if path.exists() {
            Self::load_file(path)?
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Config::default()
        };
        let config = Self::apply_env_overrides(config);
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load_file(path: &Path) -> Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Validate the root configuration file and the merged result
    ///
    /// Fails on YAML syntax errors, wrong value types and values that would
    /// be rejected at use (bad URL, time window or output format).
    pub fn validate() -> Result<Config> {
        Self::load().context("Failed to load configuration")
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(config: Config) -> Config {
        Self::apply_overrides(config, |key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides<F>(mut config: Config, lookup: F) -> Config
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(address) = lookup(API_ADDRESS_ENV).filter(|v| !v.is_empty()) {
            config.api_address = address;
        }
        if let Some(namespace) = lookup(NAMESPACE_ENV).filter(|v| !v.is_empty()) {
            config.default_namespace = Some(namespace);
        }
        config
    }

    /// Save configuration to a file
    pub fn save(config: &Config, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            paths::ensure_dir(parent)?;
        }

        let yaml =
            serde_yaml::to_string(config).context("Failed to serialize configuration to YAML")?;

        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Save root configuration
    pub fn save_root(config: &Config) -> Result<()> {
        Self::save(config, &paths::root_config_path())
    }
}

//! Hierarchical configuration loader with precedence
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Embedded defaults (built into binary)
//! 2. Runtime config (~/.transient/transient-runtime.yaml)
//! 3. Environment variables (TRANSIENT_* prefix)
//! 4. CLI flags (handled by caller)

use crate::error::{Error, Result};
use crate::types::{RetryPoliciesConfig, RuntimeConfig};
use crate::utils::get_home_dir;
use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::str::FromStr;

/// Name of the user-level runtime configuration file
pub const RUNTIME_CONFIG_FILE: &str = "transient-runtime.yaml";

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../embedded/config/"]
#[prefix = ""]
struct EmbeddedConfigs;

/// Configuration hierarchy loader
pub struct HierarchicalConfigLoader {
    /// Base directory for configuration files
    config_dir: Utf8PathBuf,
}

impl HierarchicalConfigLoader {
    /// Create a loader reading from the standard config directory
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;
        Ok(Self { config_dir })
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self { config_dir }
    }

    /// Get the standard config directory (~/.transient)
    ///
    /// The directory is not created; a missing directory simply means there
    /// is no user configuration.
    fn get_config_dir() -> Result<Utf8PathBuf> {
        Ok(get_home_dir()?.join(".transient"))
    }

    /// Load runtime configuration with hierarchical precedence
    pub fn load_runtime_config(&self) -> Result<RuntimeConfig> {
        // Start with embedded defaults
        let mut config = Self::load_embedded_config::<RuntimeConfig>("runtime-defaults.yaml")?;

        // Load from user runtime config if it exists
        let runtime_config_path = self.runtime_config_path();
        if runtime_config_path.exists() {
            tracing::debug!("Loading runtime config from {}", runtime_config_path);
            let file_config = self.load_yaml_file::<RuntimeConfig>(&runtime_config_path)?;
            config = Self::merge_runtime_config(config, file_config);
        }

        // Apply environment variable overrides
        config = self.apply_env_overrides(config)?;

        config.validate()?;
        Ok(config)
    }

    /// Load only the embedded defaults
    pub fn load_defaults() -> Result<RuntimeConfig> {
        Self::load_embedded_config("runtime-defaults.yaml")
    }

    /// Load an embedded configuration file
    fn load_embedded_config<T: DeserializeOwned>(filename: &str) -> Result<T> {
        let embedded_file = EmbeddedConfigs::get(filename).ok_or_else(|| {
            Error::config_not_found(format!("Embedded config not found: {}", filename))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::invalid_config(format!("Invalid UTF-8 in embedded config: {}", filename))
        })?;

        let config: T = serde_yaml_ng::from_str(content).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to parse embedded config {}: {}",
                filename, e
            ))
        })?;

        Ok(config)
    }

    /// Load a YAML file and parse it
    fn load_yaml_file<T: DeserializeOwned>(&self, path: &Utf8Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        let config: T =
            serde_yaml_ng::from_str(&content).map_err(|e| Error::yaml_parse(path.as_str(), e))?;
        Ok(config)
    }

    /// Merge two runtime configs (base is overridden by overlay)
    fn merge_runtime_config(base: RuntimeConfig, overlay: RuntimeConfig) -> RuntimeConfig {
        RuntimeConfig {
            retry: Self::merge_retry_policies(base.retry, overlay.retry),
        }
    }

    /// Merge retry policies
    fn merge_retry_policies(
        mut base: RetryPoliciesConfig,
        overlay: RetryPoliciesConfig,
    ) -> RetryPoliciesConfig {
        // Merge operation-specific policies
        for (key, settings) in overlay.operations {
            base.operations.insert(key, settings);
        }
        base.default = overlay.default;
        base
    }

    /// Apply environment variable overrides to the default retry settings
    fn apply_env_overrides(&self, mut config: RuntimeConfig) -> Result<RuntimeConfig> {
        let settings = &mut config.retry.default;

        if let Some(val) = env_override("TRANSIENT_RECOVERY_ENABLED")? {
            settings.recovery_enabled = val;
        }

        if let Some(val) = env_override("TRANSIENT_MAX_ATTEMPTS")? {
            settings.max_attempts = val;
        }

        if let Some(val) = env_override("TRANSIENT_STRATEGY")? {
            settings.strategy = val;
        }

        if let Some(val) = env_override("TRANSIENT_INITIAL_DELAY_MS")? {
            settings.initial_delay_ms = val;
        }

        if let Some(val) = env_override("TRANSIENT_MAX_DELAY_MS")? {
            settings.max_delay_ms = val;
        }

        if let Some(val) = env_override("TRANSIENT_MAX_LATENCY_MS")? {
            settings.max_latency_ms = Some(val);
        }

        Ok(config)
    }

    /// Path of the user-level runtime configuration file
    pub fn runtime_config_path(&self) -> Utf8PathBuf {
        self.config_dir.join(RUNTIME_CONFIG_FILE)
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}

/// Read and parse an environment variable, if set
fn env_override<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::invalid_config(format!("{} has an invalid value: {}", name, val))),
        Err(_) => Ok(None),
    }
}

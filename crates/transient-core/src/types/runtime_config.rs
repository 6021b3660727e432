//! Runtime configuration types for retry behaviour
//!
//! These types are the serializable side of retry configuration. They are
//! loaded from YAML and turned into [`RetryPolicy`] values at the call site.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::retry::{calculate_delay, RetryPolicy};

/// Complete runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuntimeConfig {
    /// Retry policy configurations
    #[serde(default)]
    pub retry: RetryPoliciesConfig,
}

impl RuntimeConfig {
    /// Get the settings for a named operation, falling back to the default
    pub fn policy_for(&self, operation: &str) -> &RetrySettings {
        self.retry.operations.get(operation).unwrap_or(&self.retry.default)
    }

    /// Validate every configured policy
    pub fn validate(&self) -> Result<()> {
        self.retry.default.validate()?;
        for (name, settings) in &self.retry.operations {
            settings
                .validate()
                .map_err(|e| Error::invalid_config(format!("operation '{}': {}", name, e)))?;
        }
        Ok(())
    }
}

/// Retry policy configurations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPoliciesConfig {
    /// Default retry settings
    #[serde(default)]
    pub default: RetrySettings,

    /// Per-operation retry settings
    #[serde(default)]
    pub operations: HashMap<String, RetrySettings>,
}

/// Retry settings for an operation
///
/// The defaults leave recovery disabled so that an operation run without
/// any configuration behaves exactly like a plain call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetrySettings {
    /// Whether failed attempts are retried at all
    #[serde(default)]
    pub recovery_enabled: bool,

    /// Retries permitted after the first attempt
    #[serde(default)]
    pub max_attempts: u32,

    /// Retry strategy
    #[serde(default)]
    pub strategy: RetryStrategy,

    /// Backoff multiplier for exponential strategies
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Add up to 25% random variation to each delay
    #[serde(default)]
    pub jitter: bool,

    /// Ceiling on execution time, excluding waits, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_latency_ms: Option<u64>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            recovery_enabled: false,
            max_attempts: 0,
            strategy: RetryStrategy::default(),
            backoff_multiplier: default_backoff_multiplier(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            jitter: false,
            max_latency_ms: None,
        }
    }
}

fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_initial_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    30000
}

impl RetrySettings {
    /// Reject settings that cannot produce a sensible backoff
    pub fn validate(&self) -> Result<()> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(Error::invalid_config(format!(
                "backoff-multiplier must be a finite number >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }

        if self.initial_delay_ms > self.max_delay_ms {
            return Err(Error::invalid_config(format!(
                "initial-delay-ms ({}) must not exceed max-delay-ms ({})",
                self.initial_delay_ms, self.max_delay_ms
            )));
        }

        Ok(())
    }

    /// The latency ceiling as a duration, unbounded when unset
    pub fn maximum_allowed_latency(&self) -> Duration {
        self.max_latency_ms
            .map(Duration::from_millis)
            .unwrap_or(Duration::MAX)
    }

    /// Build a policy that treats every fault as transient
    ///
    /// Use [`RetrySettings::policy_builder`] to plug in a different
    /// detection strategy.
    pub fn to_policy<E>(&self) -> Result<RetryPolicy<E>> {
        Ok(self.policy_builder()?.build())
    }

    /// Start a policy builder pre-filled from these settings
    pub fn policy_builder<E>(&self) -> Result<crate::retry::RetryPolicyBuilder<E>> {
        self.validate()?;

        let backoff = self.clone();
        let jitter = self.jitter;
        Ok(RetryPolicy::builder()
            .recovery_enabled(self.recovery_enabled)
            .max_attempts(self.max_attempts)
            .maximum_allowed_latency(self.maximum_allowed_latency())
            .retry_strategy_arc(Arc::new(move |attempt_index: u32| {
                calculate_delay(&backoff, attempt_index, jitter)
            })))
    }
}

/// Retry strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RetryStrategy {
    /// No delay between retries
    None,

    /// Fixed delay between retries
    FixedDelay,

    /// Exponential backoff (default)
    #[default]
    ExponentialBackoff,

    /// Linear backoff
    LinearBackoff,
}

impl std::fmt::Display for RetryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RetryStrategy::None => "none",
            RetryStrategy::FixedDelay => "fixed-delay",
            RetryStrategy::ExponentialBackoff => "exponential-backoff",
            RetryStrategy::LinearBackoff => "linear-backoff",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for RetryStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(RetryStrategy::None),
            "fixed" | "fixed-delay" => Ok(RetryStrategy::FixedDelay),
            "exponential" | "exponential-backoff" => Ok(RetryStrategy::ExponentialBackoff),
            "linear" | "linear-backoff" => Ok(RetryStrategy::LinearBackoff),
            _ => Err(Error::invalid_config(format!(
                "unknown retry strategy '{}' (expected none, fixed-delay, exponential-backoff or linear-backoff)",
                s
            ))),
        }
    }
}

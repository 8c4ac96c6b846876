//! Limiter configuration loading and validation.
//!
//! Settings are deserialized from YAML (or built in code) and validated once
//! at limiter construction; an invalid configuration is fatal there and never
//! surfaces during a request.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{FloodgateError, Result};

/// The admission algorithm to run for a limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    TokenBucket,
    FixedWindow,
    SlidingWindow,
    LeakyBucket,
}

/// What to do with a request when the state store cannot answer.
///
/// `Open` admits (appropriate for low-criticality limiters), `Closed` denies
/// (security-sensitive ones). The policy is explicit per limiter and applied
/// uniformly; the two are never mixed within one limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    Open,
    Closed,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::Open
    }
}

/// Settings for a single limiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterSettings {
    /// Which algorithm enforces this limit.
    pub strategy: StrategyKind,

    /// Maximum permits per window (or bucket capacity). Must be >= 1.
    pub capacity: u64,

    /// Window length in seconds. Must be > 0.
    #[serde(default = "default_window_secs")]
    pub window_secs: f64,

    /// Refill / leak rate in permits per second (token and leaky bucket).
    /// Defaults to `capacity / window_secs` when omitted.
    #[serde(default)]
    pub refill_rate: Option<f64>,

    /// Permits consumed per request unless the caller specifies a cost.
    #[serde(default = "default_cost")]
    pub cost: u32,

    /// Maximum compare-and-swap attempts per check before engaging the
    /// failure policy.
    #[serde(default = "default_cas_retry_limit")]
    pub cas_retry_limit: u32,

    /// Timeout for a single store call, in milliseconds.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Fail-open or fail-closed when the store cannot answer.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_window_secs() -> f64 {
    1.0
}

fn default_cost() -> u32 {
    1
}

fn default_cas_retry_limit() -> u32 {
    5
}

fn default_store_timeout_ms() -> u64 {
    100
}

impl LimiterSettings {
    /// Convenience constructor with defaults for the ancillary fields.
    pub fn new(strategy: StrategyKind, capacity: u64, window: Duration) -> Self {
        Self {
            strategy,
            capacity,
            window_secs: window.as_secs_f64(),
            refill_rate: None,
            cost: default_cost(),
            cas_retry_limit: default_cas_retry_limit(),
            store_timeout_ms: default_store_timeout_ms(),
            failure_policy: FailurePolicy::default(),
        }
    }

    /// Builder-style: set the refill / leak rate in permits per second.
    pub fn with_refill_rate(mut self, rate: f64) -> Self {
        self.refill_rate = Some(rate);
        self
    }

    /// Builder-style: set the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// The window as a [`Duration`].
    pub fn window(&self) -> Duration {
        Duration::from_secs_f64(self.window_secs)
    }

    /// Effective refill rate: the configured one, or `capacity / window`.
    pub fn effective_refill_rate(&self) -> f64 {
        self.refill_rate
            .unwrap_or(self.capacity as f64 / self.window_secs)
    }

    /// Store-call timeout as a [`Duration`].
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Validate the invariants. Called once at limiter construction.
    pub fn validate(&self) -> Result<()> {
        if self.capacity < 1 {
            return Err(FloodgateError::InvalidConfiguration(
                "capacity must be at least 1".to_string(),
            ));
        }
        if !self.window_secs.is_finite() || self.window_secs <= 0.0 {
            return Err(FloodgateError::InvalidConfiguration(
                "window must be a positive duration".to_string(),
            ));
        }
        // A positive float can still round to a zero Duration, which would
        // surface as a divide-by-zero in the window alignment at request
        // time instead of here.
        if self.window() < Duration::from_nanos(1) {
            return Err(FloodgateError::InvalidConfiguration(
                "window must be at least one nanosecond".to_string(),
            ));
        }
        if let Some(rate) = self.refill_rate {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(FloodgateError::InvalidConfiguration(
                    "refill_rate must be positive".to_string(),
                ));
            }
        }
        if self.cas_retry_limit < 1 {
            return Err(FloodgateError::InvalidConfiguration(
                "cas_retry_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A complete limiter configuration: one default plus per-route overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Settings applied when no route-specific override matches.
    pub default: LimiterSettings,

    /// Route-specific overrides, keyed by route name.
    #[serde(default)]
    pub routes: HashMap<String, LimiterSettings>,
}

impl LimiterConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading limiter configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: LimiterConfig = serde_yaml::from_str(yaml).map_err(|e| {
            FloodgateError::InvalidConfiguration(format!("failed to parse limiter config: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Settings for a route, falling back to the default.
    pub fn settings_for(&self, route: &str) -> &LimiterSettings {
        self.routes.get(route).unwrap_or(&self.default)
    }

    /// Validate all contained settings.
    pub fn validate(&self) -> Result<()> {
        self.default.validate()?;
        for (route, settings) in &self.routes {
            settings.validate().map_err(|e| {
                FloodgateError::InvalidConfiguration(format!("route {}: {}", route, e))
            })?;
        }
        Ok(())
    }
}

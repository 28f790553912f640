//! Configuration types for Stockpile
//!
//! The director is configured from a single TOML file. Every field has a
//! default so a minimal file (just the service endpoints) is enough to run
//! against a test fleet.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Root configuration for the Stockpile director
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// Control-loop configuration
    #[serde(default)]
    pub director: DirectorConfig,
    /// Caching-strategy configuration
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// Bare-metal inventory service
    #[serde(default)]
    pub inventory: EndpointConfig,
    /// Image catalog service
    #[serde(default)]
    pub catalog: EndpointConfig,
    /// Outbound call retry policy
    #[serde(default)]
    pub client: ClientConfig,
    /// Status/health HTTP server
    #[serde(default)]
    pub status: StatusConfig,
}

impl Config {
    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| Error::configuration(format!("invalid config file: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let pct = self.strategy.percentage_to_cache;
        if !(0.0..=1.0).contains(&pct) || !pct.is_finite() {
            return Err(Error::configuration(format!(
                "percentage_to_cache must be within [0, 1], got {pct}"
            )));
        }
        if self.director.poll_spacing_secs == 0 {
            return Err(Error::configuration("poll_spacing_secs must be positive"));
        }
        if self.director.directive_spacing_secs == 0 {
            return Err(Error::configuration("directive_spacing_secs must be positive"));
        }
        if self.director.cache_directive_limiting_period_secs == 0
            || self.director.eject_directive_limiting_period_secs == 0
        {
            return Err(Error::configuration("directive limiting periods must be positive"));
        }
        if self.director.dispatch_concurrency == 0 {
            return Err(Error::configuration("dispatch_concurrency must be positive"));
        }
        Ok(())
    }
}

/// Control-loop configuration
#[derive(Clone, Debug, Deserialize)]
pub struct DirectorConfig {
    /// Compute and log directives without touching hardware
    #[serde(default)]
    pub dry_run: bool,
    /// Inventory/catalog refresh cadence
    #[serde(default = "default_poll_spacing_secs")]
    pub poll_spacing_secs: u64,
    /// Strategy evaluation and dispatch cadence
    #[serde(default = "default_directive_spacing_secs")]
    pub directive_spacing_secs: u64,
    /// Maximum cache directives dispatched per limiting period (0 disables
    /// cache dispatch entirely)
    #[serde(default = "default_rate_limit")]
    pub cache_directive_rate_limit: u64,
    #[serde(default = "default_limiting_period_secs")]
    pub cache_directive_limiting_period_secs: u64,
    /// Maximum eject directives dispatched per limiting period
    #[serde(default = "default_rate_limit")]
    pub eject_directive_rate_limit: u64,
    #[serde(default = "default_limiting_period_secs")]
    pub eject_directive_limiting_period_secs: u64,
    /// Log a statistics summary after each directive cycle
    #[serde(default = "default_log_statistics")]
    pub log_statistics: bool,
    /// Upper bound on concurrently in-flight directive dispatches
    #[serde(default = "default_dispatch_concurrency")]
    pub dispatch_concurrency: usize,
}

impl DirectorConfig {
    /// Inventory/catalog refresh cadence as a [`Duration`]
    #[must_use]
    pub fn poll_spacing(&self) -> Duration {
        Duration::from_secs(self.poll_spacing_secs)
    }

    /// Strategy evaluation cadence as a [`Duration`]
    #[must_use]
    pub fn directive_spacing(&self) -> Duration {
        Duration::from_secs(self.directive_spacing_secs)
    }

    /// Cache-directive limiting period as a [`Duration`]
    #[must_use]
    pub fn cache_limiting_period(&self) -> Duration {
        Duration::from_secs(self.cache_directive_limiting_period_secs)
    }

    /// Eject-directive limiting period as a [`Duration`]
    #[must_use]
    pub fn eject_limiting_period(&self) -> Duration {
        Duration::from_secs(self.eject_directive_limiting_period_secs)
    }
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            poll_spacing_secs: default_poll_spacing_secs(),
            directive_spacing_secs: default_directive_spacing_secs(),
            cache_directive_rate_limit: default_rate_limit(),
            cache_directive_limiting_period_secs: default_limiting_period_secs(),
            eject_directive_rate_limit: default_rate_limit(),
            eject_directive_limiting_period_secs: default_limiting_period_secs(),
            log_statistics: default_log_statistics(),
            dispatch_concurrency: default_dispatch_concurrency(),
        }
    }
}

fn default_poll_spacing_secs() -> u64 {
    120
}

fn default_directive_spacing_secs() -> u64 {
    120
}

fn default_rate_limit() -> u64 {
    100
}

fn default_limiting_period_secs() -> u64 {
    60
}

fn default_log_statistics() -> bool {
    true
}

fn default_dispatch_concurrency() -> usize {
    8
}

/// Policy for choosing which over-target cached nodes to eject first
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EjectionPolicy {
    /// Eject the nodes whose inventory record was updated longest ago
    #[default]
    OldestFirst,
    /// Eject the nodes caching the lowest-weighted image
    LightestImageFirst,
}

/// Caching-strategy configuration
#[derive(Clone, Debug, Deserialize)]
pub struct StrategyConfig {
    /// Registered strategy name
    #[serde(default = "default_strategy_name")]
    pub name: String,
    /// Fraction of eligible nodes to keep cached, within [0, 1]
    #[serde(default = "default_percentage_to_cache")]
    pub percentage_to_cache: f64,
    /// Per-image selection weights, keyed by image name
    #[serde(default)]
    pub image_weights: HashMap<String, u32>,
    /// Weight for catalog images absent from `image_weights`; 0 excludes
    /// them from selection entirely
    #[serde(default)]
    pub default_image_weight: u32,
    /// Tie-break for over-target ejection
    #[serde(default)]
    pub ejection_policy: EjectionPolicy,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            name: default_strategy_name(),
            percentage_to_cache: default_percentage_to_cache(),
            image_weights: HashMap::new(),
            default_image_weight: 0,
            ejection_policy: EjectionPolicy::default(),
        }
    }
}

fn default_strategy_name() -> String {
    "simple_proportional".to_string()
}

fn default_percentage_to_cache() -> f64 {
    0.5
}

/// One external HTTP service endpoint
#[derive(Clone, Debug, Deserialize)]
pub struct EndpointConfig {
    /// Base URL, e.g. `http://ironic.example:6385/v1`
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            api_endpoint: default_api_endpoint(),
        }
    }
}

fn default_api_endpoint() -> String {
    "http://localhost:8080".to_string()
}

/// Retry policy for outbound service calls
#[derive(Clone, Debug, Deserialize)]
pub struct ClientConfig {
    /// Total attempts per call, including the first
    #[serde(default = "default_call_max_retries")]
    pub call_max_retries: u32,
    /// Fixed delay between attempts
    #[serde(default = "default_call_retry_interval_secs")]
    pub call_retry_interval_secs: u64,
}

impl ClientConfig {
    /// Retry interval as a [`Duration`]
    #[must_use]
    pub fn call_retry_interval(&self) -> Duration {
        Duration::from_secs(self.call_retry_interval_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            call_max_retries: default_call_max_retries(),
            call_retry_interval_secs: default_call_retry_interval_secs(),
        }
    }
}

fn default_call_max_retries() -> u32 {
    3
}

fn default_call_retry_interval_secs() -> u64 {
    3
}

/// Status/health HTTP server configuration
#[derive(Clone, Debug, Deserialize)]
pub struct StatusConfig {
    /// Listen address for `/health`, `/status`, and `/metrics`
    #[serde(default = "default_status_listen")]
    pub listen: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            listen: default_status_listen(),
        }
    }
}

fn default_status_listen() -> String {
    "0.0.0.0:9420".to_string()
}

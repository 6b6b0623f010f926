use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for a single job's barrier loop.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BarrierConfig {
    #[serde(default = "default_max_sleep_ms")]
    pub max_sleep_ms: u64,
    #[serde(default = "default_barrier_period_ms")]
    pub barrier_period_ms: u64,
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,
    #[serde(default = "default_tenancy_id")]
    pub tenancy_id: String,
}

fn default_max_sleep_ms() -> u64 {
    1_000
}

fn default_barrier_period_ms() -> u64 {
    5_000
}

fn default_heartbeat_ms() -> u64 {
    2_000
}

fn default_tenancy_id() -> String {
    "default".to_string()
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self {
            max_sleep_ms: default_max_sleep_ms(),
            barrier_period_ms: default_barrier_period_ms(),
            heartbeat_ms: default_heartbeat_ms(),
            tenancy_id: default_tenancy_id(),
        }
    }
}

impl BarrierConfig {
    pub fn max_sleep(&self) -> Duration {
        Duration::from_millis(self.max_sleep_ms)
    }

    pub fn barrier_period(&self) -> Duration {
        Duration::from_millis(self.barrier_period_ms)
    }

    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    /// Layers `ONYX_BARRIER__*` environment overrides on the defaults.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(config::Environment::with_prefix("ONYX_BARRIER").separator("__"))
            .build()?
            .try_deserialize()
    }
}

use serde::{Deserialize, Serialize};

/// Tunables for the cluster coordinator's event loops. Loaded from
/// compiled-in defaults, optionally overridden by `ONYX_CLUSTER__*`
/// environment variables.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Milliseconds after an offer before an unacked peer is forcibly
    /// evicted. Zero means "evict immediately after offer," used in
    /// tests for determinism.
    #[serde(default = "default_revoke_delay_ms")]
    pub revoke_delay_ms: u64,

    /// Bound on every mpsc/broadcast channel the coordinator creates.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_revoke_delay_ms() -> u64 {
    10_000
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            revoke_delay_ms: default_revoke_delay_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl ClusterConfig {
    /// Layers `ONYX_CLUSTER__REVOKE_DELAY_MS`-style environment
    /// overrides on top of the compiled-in defaults.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(config::Environment::with_prefix("ONYX_CLUSTER").separator("__"))
            .build()?
            .try_deserialize()
    }
}

use std::time::Duration;

use oplite_core::{BlsPublicKey, ChainConfig, ConfigError, Slot};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BATCH_SIZE: usize = 128;
pub const DEFAULT_POLLING_DELAY: Duration = Duration::from_secs(12);

/// The trust anchor: a committee the operator trusts and the slot it is for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisData {
    pub committee: Vec<BlsPublicKey>,
    pub slot: Slot,
    /// Chain genesis time; the chain preset's value when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
}

/// Backoff for `get_next_valid_execution_info`: the delay starts at
/// `base_delay` and doubles until it exceeds `max_delay`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(with = "duration_secs")]
    pub base_delay: Duration,
    #[serde(with = "duration_secs")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(16),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub genesis: GenesisData,
    pub chain: ChainConfig,
    /// Periods requested per batch from provers.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_polling_delay", with = "duration_secs")]
    pub polling_delay: Duration,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_polling_delay() -> Duration {
    DEFAULT_POLLING_DELAY
}

impl ClientConfig {
    pub fn new(genesis: GenesisData, chain: ChainConfig) -> Self {
        Self {
            genesis,
            chain,
            batch_size: DEFAULT_BATCH_SIZE,
            polling_delay: DEFAULT_POLLING_DELAY,
            retry: RetryConfig::default(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chain.validate()?;
        if self.genesis.committee.len() != self.chain.sync_committee_size {
            return Err(ConfigError::GenesisCommitteeSize {
                expected: self.chain.sync_committee_size,
                got: self.genesis.committee.len(),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroLength("batch_size"));
        }
        if self.retry.base_delay.is_zero() {
            return Err(ConfigError::ZeroLength("retry.base_delay"));
        }
        Ok(())
    }

    pub fn genesis_time(&self) -> u64 {
        self.genesis.time.unwrap_or(self.chain.genesis_time)
    }
}

/// Durations as whole seconds.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

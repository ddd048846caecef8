//! Chain parameters the verifier depends on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::merkle::Root;
use crate::types::beacon::Slot;
use crate::types::serde_utils::hex_fixed;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroLength(&'static str),

    #[error("Sync committee size {0} is not a multiple of 8")]
    UnalignedCommitteeSize(usize),

    #[error("Fork schedule is empty")]
    NoForks,

    #[error("Fork schedule is not ordered by epoch at '{0}'")]
    UnorderedForks(String),

    #[error("Genesis committee has {got} members, the chain expects {expected}")]
    GenesisCommitteeSize { expected: usize, got: usize },

    #[error("Invalid genesis public key at index {index}: {reason}")]
    GenesisPublicKey { index: usize, reason: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// One entry of the fork schedule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fork {
    pub name: String,
    pub epoch: u64,
    #[serde(with = "hex_fixed")]
    pub version: [u8; 4],
}

impl Fork {
    fn new(name: &str, epoch: u64, version: [u8; 4]) -> Self {
        Self {
            name: name.to_string(),
            epoch,
            version,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub genesis_time: u64,
    #[serde(with = "hex_fixed")]
    pub genesis_validators_root: Root,
    pub seconds_per_slot: u64,
    pub slots_per_epoch: u64,
    pub epochs_per_sync_committee_period: u64,
    pub sync_committee_size: usize,
    /// Ordered by activation epoch, genesis fork first.
    pub forks: Vec<Fork>,
}

impl ChainConfig {
    pub fn mainnet() -> Self {
        Self {
            genesis_time: 1606824023,
            genesis_validators_root: hex_literal::hex!(
                "4b363db94e286120d76eb905340fdd4e54bfe9f06bf33ff6cf5ad27f511bfe95"
            ),
            seconds_per_slot: 12,
            slots_per_epoch: 32,
            epochs_per_sync_committee_period: 256,
            sync_committee_size: 512,
            forks: vec![
                Fork::new("phase0", 0, [0x00, 0x00, 0x00, 0x00]),
                Fork::new("altair", 74240, [0x01, 0x00, 0x00, 0x00]),
                Fork::new("bellatrix", 144896, [0x02, 0x00, 0x00, 0x00]),
                Fork::new("capella", 194048, [0x03, 0x00, 0x00, 0x00]),
                Fork::new("deneb", 269568, [0x04, 0x00, 0x00, 0x00]),
            ],
        }
    }

    pub fn sepolia() -> Self {
        Self {
            genesis_time: 1655733600,
            genesis_validators_root: hex_literal::hex!(
                "d8ea171f3c94aea21ebc42a1ed61052acf3f9209c00e4efbaaddac09ed9b8078"
            ),
            seconds_per_slot: 12,
            slots_per_epoch: 32,
            epochs_per_sync_committee_period: 256,
            sync_committee_size: 512,
            forks: vec![
                Fork::new("phase0", 0, [0x90, 0x00, 0x00, 0x69]),
                Fork::new("altair", 50, [0x90, 0x00, 0x00, 0x70]),
                Fork::new("bellatrix", 100, [0x90, 0x00, 0x00, 0x71]),
                Fork::new("capella", 56832, [0x90, 0x00, 0x00, 0x72]),
                Fork::new("deneb", 132608, [0x90, 0x00, 0x00, 0x73]),
            ],
        }
    }

    /// The consensus "minimal" preset: 32-member committees, 64-slot periods.
    pub fn minimal() -> Self {
        Self {
            genesis_time: 0,
            genesis_validators_root: [0u8; 32],
            seconds_per_slot: 6,
            slots_per_epoch: 8,
            epochs_per_sync_committee_period: 8,
            sync_committee_size: 32,
            forks: vec![
                Fork::new("phase0", 0, [0x00, 0x00, 0x00, 0x01]),
                Fork::new("altair", 0, [0x01, 0x00, 0x00, 0x01]),
                Fork::new("bellatrix", 0, [0x02, 0x00, 0x00, 0x01]),
                Fork::new("capella", 0, [0x03, 0x00, 0x00, 0x01]),
                Fork::new("deneb", 0, [0x04, 0x00, 0x00, 0x01]),
            ],
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.seconds_per_slot == 0 {
            return Err(ConfigError::ZeroLength("seconds_per_slot"));
        }
        if self.slots_per_epoch == 0 {
            return Err(ConfigError::ZeroLength("slots_per_epoch"));
        }
        if self.epochs_per_sync_committee_period == 0 {
            return Err(ConfigError::ZeroLength("epochs_per_sync_committee_period"));
        }
        if self.sync_committee_size == 0 {
            return Err(ConfigError::ZeroLength("sync_committee_size"));
        }
        if self.sync_committee_size % 8 != 0 {
            return Err(ConfigError::UnalignedCommitteeSize(self.sync_committee_size));
        }
        if self.forks.is_empty() {
            return Err(ConfigError::NoForks);
        }
        if let Some(pair) = self.forks.windows(2).find(|w| w[1].epoch < w[0].epoch) {
            return Err(ConfigError::UnorderedForks(pair[1].name.clone()));
        }
        Ok(())
    }

    pub fn slots_per_period(&self) -> u64 {
        self.slots_per_epoch * self.epochs_per_sync_committee_period
    }

    /// Supermajority threshold: the smallest participant count with
    /// `participants * 3 >= size * 2`.
    pub fn min_participants(&self) -> usize {
        (self.sync_committee_size * 2).div_ceil(3)
    }

    /// Version of the fork active at `slot`.
    pub fn fork_version_at_slot(&self, slot: Slot) -> Result<[u8; 4], ConfigError> {
        if self.slots_per_epoch == 0 {
            return Err(ConfigError::ZeroLength("slots_per_epoch"));
        }
        let epoch = slot / self.slots_per_epoch;
        self.forks
            .iter()
            .rev()
            .find(|fork| fork.epoch <= epoch)
            .map(|fork| fork.version)
            .ok_or(ConfigError::NoForks)
    }
}

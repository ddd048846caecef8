use alloy_primitives::B256;
use oplite_core::{ConfigError, Slot, SszError, SyncPeriod, VerificationError};
use thiserror::Error;

use crate::network::NetworkError;
use crate::prover::PeriodRequest;

/// Failures of an untrusted collaborator (prover, store or beacon feed).
#[derive(Debug, Error)]
pub enum ProverError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("Failed to decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },

    #[error(transparent)]
    Ssz(#[from] SszError),

    #[error("No {what} available for period {period}")]
    NotFound {
        what: &'static str,
        period: PeriodRequest,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("No {what} stored for period {period}")]
    Missing {
        what: &'static str,
        period: SyncPeriod,
    },

    #[error(transparent)]
    Ssz(#[from] SszError),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Verification failed: {0}")]
    Verification(#[from] VerificationError),

    /// The block body does not hash to the body root of the signed header.
    #[error("Block body at slot {slot} hashes to {computed}, but the signed header commits to {expected}")]
    BodyRootMismatch {
        slot: Slot,
        expected: B256,
        computed: B256,
    },

    #[error("None of the provers responded honestly")]
    NoHonestSource,

    #[error("Committee served by prover {prover} for period {period} does not hash to {expected}")]
    CommitteeMismatch {
        prover: usize,
        period: SyncPeriod,
        expected: B256,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] ProverError),

    #[error("Client has not synced a committee yet")]
    NotSynced,

    #[error("Current period {current} is before the genesis period {genesis}")]
    BeforeGenesis {
        current: SyncPeriod,
        genesis: SyncPeriod,
    },

    #[error("No valid execution payload found after {attempts} attempts")]
    NoValidExecution { attempts: u32 },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Whether waiting and asking again can produce a different outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Verification(_) | Self::Transport(_) | Self::NotSynced
        )
    }
}

use blst::min_pk::{AggregatePublicKey, PublicKey, Signature};
use blst::BLST_ERROR;
use thiserror::Error;

use crate::config::{ChainConfig, ConfigError};
use crate::merkle::{sha256_hash, sha256_pair, Root};
use crate::types::beacon::*;

/// Domain separation tag for Ethereum BLS signatures (proof-of-possession scheme).
pub const BLS_DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Errors that can occur during sync committee verification.
/// Each variant represents a specific, actionable failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Insufficient sync committee participation: {participants}/{committee_size} (need at least {required})")]
    InsufficientParticipation {
        participants: usize,
        required: usize,
        committee_size: usize,
    },

    #[error("Invalid BLS signature: the aggregate signature does not verify against the participating committee members")]
    InvalidSignature,

    #[error("Invalid BLS public key at index {index}: {reason}")]
    InvalidPublicKey { index: usize, reason: String },

    #[error("Sync committee bits length mismatch: expected {expected} bytes, got {got}")]
    InvalidSyncCommitteeBitsLength { expected: usize, got: usize },

    #[error("Sync committee has {got} members, expected {expected}")]
    InvalidCommitteeSize { expected: usize, got: usize },

    #[error("Expected update with period {expected}, but received {got}")]
    PeriodMismatch { expected: SyncPeriod, got: SyncPeriod },

    #[error("Signature slot {signature_slot} is not after attested header slot {attested_slot}")]
    InvalidSlotOrder {
        signature_slot: Slot,
        attested_slot: Slot,
    },

    #[error("Invalid Merkle branch for finalized header: branch verification failed")]
    InvalidFinalityBranch,

    #[error("Invalid Merkle branch for next sync committee: branch verification failed")]
    InvalidNextSyncCommitteeBranch,

    #[error("Invalid chain configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("BLS aggregation error: {0}")]
    BlsError(String),
}

impl VerificationError {
    /// Short diagnostic tag for the failure.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InsufficientParticipation { .. } => "insufficient signatures",
            Self::InvalidSignature
            | Self::InvalidPublicKey { .. }
            | Self::InvalidSyncCommitteeBitsLength { .. }
            | Self::BlsError(_) => "invalid signatures",
            Self::InvalidCommitteeSize { .. } => "invalid committee",
            Self::PeriodMismatch { .. } => "period mismatch",
            Self::InvalidSlotOrder { .. } => "invalid slot order",
            Self::InvalidFinalityBranch | Self::InvalidNextSyncCommitteeBranch => {
                "invalid merkle branch"
            }
            Self::Config(_) => "invalid configuration",
        }
    }
}

/// Content hash identifying a committee: SHA256 over the concatenated
/// serialized public keys.
pub fn committee_hash(pubkeys: &[BlsPublicKey]) -> Root {
    let bytes: Vec<u8> = pubkeys.iter().flat_map(|pk| pk.0).collect();
    sha256_hash(&bytes)
}

/// domain = domain_type ++ fork_data_root[..28]
pub fn compute_domain(
    domain_type: &[u8; 4],
    fork_version: &[u8; 4],
    genesis_validators_root: &Root,
) -> Root {
    let fork_data_root = compute_fork_data_root(fork_version, genesis_validators_root);
    let mut domain = [0u8; 32];
    domain[..4].copy_from_slice(domain_type);
    domain[4..].copy_from_slice(&fork_data_root[..28]);
    domain
}

fn compute_fork_data_root(fork_version: &[u8; 4], genesis_validators_root: &Root) -> Root {
    let mut version_leaf = [0u8; 32];
    version_leaf[..4].copy_from_slice(fork_version);
    sha256_pair(&version_leaf, genesis_validators_root)
}

/// hash_tree_root(SigningData { object_root, domain })
pub fn compute_signing_root(object_root: &Root, domain: &Root) -> Root {
    sha256_pair(object_root, domain)
}

/// Signing root the committee signs for `header_root` at `signature_slot`.
/// The fork is the one active at the slot before the signature slot.
pub fn sync_committee_signing_root(
    config: &ChainConfig,
    header_root: &Root,
    signature_slot: Slot,
) -> Result<Root, VerificationError> {
    let fork_version = config.fork_version_at_slot(signature_slot.max(1) - 1)?;
    let domain = compute_domain(
        &DOMAIN_SYNC_COMMITTEE,
        &fork_version,
        &config.genesis_validators_root,
    );
    Ok(compute_signing_root(header_root, &domain))
}

/// Verify that `committee` signed `header_root` with a supermajority.
///
/// Participation is checked before the pairing, so an update below the
/// two-thirds threshold is rejected as insufficient even when its signature
/// is valid.
pub fn verify_signed_header(
    config: &ChainConfig,
    committee: &[BlsPublicKey],
    sync_aggregate: &SyncAggregate,
    header_root: &Root,
    signature_slot: Slot,
) -> Result<(), VerificationError> {
    let size = config.sync_committee_size;
    if committee.len() != size {
        return Err(VerificationError::InvalidCommitteeSize {
            expected: size,
            got: committee.len(),
        });
    }

    let bits_len = sync_aggregate.sync_committee_bits.len();
    if bits_len != size / 8 {
        return Err(VerificationError::InvalidSyncCommitteeBitsLength {
            expected: size / 8,
            got: bits_len,
        });
    }

    let participants = sync_aggregate.num_participants();
    if participants * 3 < size * 2 {
        return Err(VerificationError::InsufficientParticipation {
            participants,
            required: config.min_participants(),
            committee_size: size,
        });
    }

    let signing_root = sync_committee_signing_root(config, header_root, signature_slot)?;

    let participant_pubkeys: Vec<(usize, &BlsPublicKey)> = sync_aggregate
        .participant_indices()
        .into_iter()
        .map(|i| (i, &committee[i]))
        .collect();

    verify_aggregate_bls_signature(
        &participant_pubkeys,
        &signing_root,
        &sync_aggregate.sync_committee_signature,
    )
}

/// Verify an aggregate BLS12-381 signature over `message` by `pubkeys`
/// (paired with their committee index for error reporting).
fn verify_aggregate_bls_signature(
    pubkeys: &[(usize, &BlsPublicKey)],
    message: &Root,
    signature: &BlsSignature,
) -> Result<(), VerificationError> {
    if pubkeys.is_empty() {
        return Err(VerificationError::BlsError("no participating public keys".into()));
    }

    let sig = Signature::from_bytes(&signature.0).map_err(|e| {
        VerificationError::BlsError(format!("Failed to deserialize signature: {:?}", e))
    })?;

    let pks: Vec<PublicKey> = pubkeys
        .iter()
        .map(|(index, pk)| {
            PublicKey::from_bytes(&pk.0).map_err(|e| VerificationError::InvalidPublicKey {
                index: *index,
                reason: format!("{:?}", e),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let pk_refs: Vec<&PublicKey> = pks.iter().collect();
    let agg_pk = AggregatePublicKey::aggregate(&pk_refs, false).map_err(|e| {
        VerificationError::BlsError(format!("Failed to aggregate public keys: {:?}", e))
    })?;

    let result = sig.verify(true, message, BLS_DST, &[], &agg_pk.to_public_key(), false);
    if result != BLST_ERROR::BLST_SUCCESS {
        return Err(VerificationError::InvalidSignature);
    }

    Ok(())
}

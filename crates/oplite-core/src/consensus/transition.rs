use crate::config::ChainConfig;
use crate::consensus::period::period_at_slot;
use crate::consensus::sync_committee::{verify_signed_header, VerificationError};
use crate::merkle::verify_merkle_branch;
use crate::types::beacon::*;
use tree_hash::TreeHash;

/// Generalized index of `finalized_checkpoint.root` in the beacon state (altair..deneb).
pub const FINALIZED_ROOT_GINDEX: u64 = 105;
pub const FINALIZED_ROOT_DEPTH: usize = 6;

/// Generalized index of `next_sync_committee` in the beacon state (altair..deneb).
pub const NEXT_SYNC_COMMITTEE_GINDEX: u64 = 55;
pub const NEXT_SYNC_COMMITTEE_DEPTH: usize = 5;

/// Verify that `update` was signed by `prev_committee` (the committee of
/// `period`) and return the committee it proves for `period + 1`.
///
/// Structural checks and Merkle branches run first; the pairing runs last.
pub fn verify_committee_transition(
    config: &ChainConfig,
    prev_committee: &[BlsPublicKey],
    period: SyncPeriod,
    update: &LightClientUpdate,
) -> Result<Vec<BlsPublicKey>, VerificationError> {
    let update_period = period_at_slot(config, update.attested_header.slot)?;
    if update_period != period {
        return Err(VerificationError::PeriodMismatch {
            expected: period,
            got: update_period,
        });
    }

    if update.signature_slot <= update.attested_header.slot {
        return Err(VerificationError::InvalidSlotOrder {
            signature_slot: update.signature_slot,
            attested_slot: update.attested_header.slot,
        });
    }

    let next = &update.next_sync_committee;
    if next.pubkeys.len() != config.sync_committee_size {
        return Err(VerificationError::InvalidCommitteeSize {
            expected: config.sync_committee_size,
            got: next.pubkeys.len(),
        });
    }

    let state_root = &update.attested_header.state_root.0;
    if !verify_merkle_branch(
        &next.tree_hash_root().0,
        &update.next_sync_committee_branch,
        NEXT_SYNC_COMMITTEE_DEPTH,
        NEXT_SYNC_COMMITTEE_GINDEX,
        state_root,
    ) {
        return Err(VerificationError::InvalidNextSyncCommitteeBranch);
    }

    verify_finality_branch(update)?;

    verify_signed_header(
        config,
        prev_committee,
        &update.sync_aggregate,
        &update.attested_header.root(),
        update.signature_slot,
    )?;

    Ok(next.pubkeys.clone())
}

/// An update without finality carries an empty header and a zero branch.
fn verify_finality_branch(update: &LightClientUpdate) -> Result<(), VerificationError> {
    if update.finalized_header.is_empty() {
        if update.finality_branch.iter().all(|node| *node == [0u8; 32]) {
            return Ok(());
        }
        return Err(VerificationError::InvalidFinalityBranch);
    }

    if !verify_merkle_branch(
        &update.finalized_header.root(),
        &update.finality_branch,
        FINALIZED_ROOT_DEPTH,
        FINALIZED_ROOT_GINDEX,
        &update.attested_header.state_root.0,
    ) {
        return Err(VerificationError::InvalidFinalityBranch);
    }
    Ok(())
}

/// Verify that `committee` signed the optimistic update's attested header.
pub fn verify_optimistic_update(
    config: &ChainConfig,
    committee: &[BlsPublicKey],
    update: &OptimisticUpdate,
) -> Result<(), VerificationError> {
    if update.signature_slot <= update.attested_header.slot {
        return Err(VerificationError::InvalidSlotOrder {
            signature_slot: update.signature_slot,
            attested_slot: update.attested_header.slot,
        });
    }

    verify_signed_header(
        config,
        committee,
        &update.sync_aggregate,
        &update.attested_header.root(),
        update.signature_slot,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::compute_branch_root;
    use ethereum_types::H256;
    use crate::testing::{build_optimistic_update, build_update, TestCommittee};

    #[test]
    fn test_valid_transition_returns_next_committee() {
        let config = ChainConfig::minimal();
        let current = TestCommittee::generate(10, 32);
        let next = TestCommittee::generate(11, 32);

        let update = build_update(&config, &current, 100, &next.committee(), 32);
        let verified = verify_committee_transition(&config, &current.pubkeys, 100, &update).unwrap();
        assert_eq!(verified, next.pubkeys);
    }

    #[test]
    fn test_update_for_other_period_is_rejected() {
        let config = ChainConfig::minimal();
        let current = TestCommittee::generate(10, 32);
        let next = TestCommittee::generate(11, 32);

        let update = build_update(&config, &current, 100, &next.committee(), 32);
        let err = verify_committee_transition(&config, &current.pubkeys, 101, &update).unwrap_err();
        assert_eq!(err, VerificationError::PeriodMismatch { expected: 101, got: 100 });
        assert_eq!(err.reason(), "period mismatch");
    }

    #[test]
    fn test_substituted_next_committee_breaks_branch() {
        let config = ChainConfig::minimal();
        let current = TestCommittee::generate(10, 32);
        let next = TestCommittee::generate(11, 32);
        let forged = TestCommittee::generate(12, 32);

        let mut update = build_update(&config, &current, 100, &next.committee(), 32);
        update.next_sync_committee = forged.committee();
        let err = verify_committee_transition(&config, &current.pubkeys, 100, &update).unwrap_err();
        assert_eq!(err, VerificationError::InvalidNextSyncCommitteeBranch);
    }

    #[test]
    fn test_update_signed_by_wrong_committee() {
        let config = ChainConfig::minimal();
        let current = TestCommittee::generate(10, 32);
        let liar = TestCommittee::generate(13, 32);
        let next = TestCommittee::generate(11, 32);

        let update = build_update(&config, &liar, 100, &next.committee(), 32);
        let err = verify_committee_transition(&config, &current.pubkeys, 100, &update).unwrap_err();
        assert_eq!(err, VerificationError::InvalidSignature);
    }

    #[test]
    fn test_finality_branch_checked_when_present() {
        let config = ChainConfig::minimal();
        let current = TestCommittee::generate(10, 32);
        let next = TestCommittee::generate(11, 32);

        let mut update = build_update(&config, &current, 100, &next.committee(), 32);
        update.finality_branch[0] = [1; 32];
        let err = verify_committee_transition(&config, &current.pubkeys, 100, &update).unwrap_err();
        assert_eq!(err, VerificationError::InvalidFinalityBranch);

        // A finalized header needs a branch to the attested state root.
        let mut update = build_update(&config, &current, 100, &next.committee(), 32);
        update.finalized_header = BeaconBlockHeader {
            slot: 6390,
            ..Default::default()
        };
        let err = verify_committee_transition(&config, &current.pubkeys, 100, &update).unwrap_err();
        assert_eq!(err, VerificationError::InvalidFinalityBranch);
    }

    #[test]
    fn test_finality_branch_helper_accepts_valid_proof() {
        let finalized = BeaconBlockHeader {
            slot: 6390,
            ..Default::default()
        };
        let branch: Vec<[u8; 32]> = (0..FINALIZED_ROOT_DEPTH as u8).map(|i| [i + 40; 32]).collect();
        let state_root =
            H256(compute_branch_root(&finalized.root(), &branch, FINALIZED_ROOT_GINDEX));

        let update = LightClientUpdate {
            attested_header: BeaconBlockHeader {
                slot: 6401,
                state_root,
                ..Default::default()
            },
            next_sync_committee: TestCommittee::generate(11, 32).committee(),
            next_sync_committee_branch: vec![],
            finalized_header: finalized,
            finality_branch: branch,
            sync_aggregate: SyncAggregate::default(),
            signature_slot: 6402,
        };
        verify_finality_branch(&update).unwrap();
    }

    #[test]
    fn test_optimistic_update() {
        let config = ChainConfig::minimal();
        let committee = TestCommittee::generate(20, 32);
        let update = build_optimistic_update(&config, &committee, 6500, [4; 32], 30);
        verify_optimistic_update(&config, &committee.pubkeys, &update).unwrap();

        let mut late = update.clone();
        late.signature_slot = late.attested_header.slot;
        assert!(matches!(
            verify_optimistic_update(&config, &committee.pubkeys, &late),
            Err(VerificationError::InvalidSlotOrder { .. })
        ));

        let weak = build_optimistic_update(&config, &committee, 6500, [4; 32], 10);
        assert_eq!(
            verify_optimistic_update(&config, &committee.pubkeys, &weak)
                .unwrap_err()
                .reason(),
            "insufficient signatures"
        );
    }
}

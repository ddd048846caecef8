//! Fixtures for tests: real BLS committees and correctly signed updates.

use blst::min_pk::{AggregatePublicKey, AggregateSignature, SecretKey};
use ethereum_types::{H160, H256, U256};
use ssz_types::{BitList, FixedVector, VariableList};
use tree_hash::TreeHash;

use crate::config::ChainConfig;
use crate::consensus::sync_committee::{committee_hash, sync_committee_signing_root, BLS_DST};
use crate::consensus::transition::{
    FINALIZED_ROOT_DEPTH, NEXT_SYNC_COMMITTEE_DEPTH, NEXT_SYNC_COMMITTEE_GINDEX,
};
use crate::merkle::{compute_branch_root, sha256_hash, Root};
use crate::types::beacon::*;
use crate::types::body::*;

/// A committee whose secret keys we hold.
pub struct TestCommittee {
    secret_keys: Vec<SecretKey>,
    pub pubkeys: Vec<BlsPublicKey>,
}

impl TestCommittee {
    /// Deterministic committee of `size` members derived from `seed`.
    pub fn generate(seed: u64, size: usize) -> Self {
        let secret_keys: Vec<SecretKey> = (0..size as u64)
            .map(|i| {
                let mut input = seed.to_le_bytes().to_vec();
                input.extend_from_slice(&i.to_le_bytes());
                let ikm = sha256_hash(&input);
                SecretKey::key_gen(&ikm, &[]).expect("32-byte ikm")
            })
            .collect();
        let pubkeys = secret_keys
            .iter()
            .map(|sk| BlsPublicKey(sk.sk_to_pk().to_bytes()))
            .collect();
        Self {
            secret_keys,
            pubkeys,
        }
    }

    pub fn committee(&self) -> SyncCommittee {
        let pks: Vec<_> = self.secret_keys.iter().map(|sk| sk.sk_to_pk()).collect();
        let refs: Vec<_> = pks.iter().collect();
        let aggregate = AggregatePublicKey::aggregate(&refs, false).expect("non-empty committee");
        SyncCommittee {
            pubkeys: self.pubkeys.clone(),
            aggregate_pubkey: BlsPublicKey(aggregate.to_public_key().to_bytes()),
        }
    }

    pub fn hash(&self) -> Root {
        committee_hash(&self.pubkeys)
    }

    /// Sign `header_root` with the first `participants` members.
    pub fn sign(
        &self,
        config: &ChainConfig,
        header_root: &Root,
        signature_slot: Slot,
        participants: usize,
    ) -> SyncAggregate {
        let message = sync_committee_signing_root(config, header_root, signature_slot)
            .expect("valid test config");

        let mut bits = vec![0u8; self.secret_keys.len().div_ceil(8)];
        for i in 0..participants {
            bits[i / 8] |= 1 << (i % 8);
        }

        let signatures: Vec<_> = self.secret_keys[..participants]
            .iter()
            .map(|sk| sk.sign(&message, BLS_DST, &[]))
            .collect();
        let signature = if signatures.is_empty() {
            BlsSignature::default()
        } else {
            let refs: Vec<_> = signatures.iter().collect();
            let aggregate = AggregateSignature::aggregate(&refs, false).expect("signatures");
            BlsSignature(aggregate.to_signature().to_bytes())
        };

        SyncAggregate {
            sync_committee_bits: bits,
            sync_committee_signature: signature,
        }
    }
}

/// An update for `period`, signed by `signer`, proving `next` with a valid
/// next-sync-committee branch and no finality.
pub fn build_update(
    config: &ChainConfig,
    signer: &TestCommittee,
    period: SyncPeriod,
    next: &SyncCommittee,
    participants: usize,
) -> LightClientUpdate {
    let branch: Vec<Root> = (0..NEXT_SYNC_COMMITTEE_DEPTH as u8)
        .map(|i| [i + 1; 32])
        .collect();
    let state_root = compute_branch_root(
        &next.tree_hash_root().0,
        &branch,
        NEXT_SYNC_COMMITTEE_GINDEX,
    );

    let attested_header = BeaconBlockHeader {
        slot: period * config.slots_per_period() + 1,
        proposer_index: period,
        parent_root: H256([0xab; 32]),
        state_root: H256(state_root),
        body_root: H256([0xcd; 32]),
    };
    let signature_slot = attested_header.slot + 1;
    let sync_aggregate = signer.sign(
        config,
        &attested_header.root(),
        signature_slot,
        participants,
    );

    LightClientUpdate {
        attested_header,
        next_sync_committee: next.clone(),
        next_sync_committee_branch: branch,
        finalized_header: BeaconBlockHeader::default(),
        finality_branch: vec![[0u8; 32]; FINALIZED_ROOT_DEPTH],
        sync_aggregate,
        signature_slot,
    }
}

/// An optimistic update for a header at `slot` committing to `body_root`.
pub fn build_optimistic_update(
    config: &ChainConfig,
    signer: &TestCommittee,
    slot: Slot,
    body_root: Root,
    participants: usize,
) -> OptimisticUpdate {
    let attested_header = BeaconBlockHeader {
        slot,
        proposer_index: 1,
        parent_root: H256([0x11; 32]),
        state_root: H256([0x22; 32]),
        body_root: H256(body_root),
    };
    let signature_slot = slot + 1;
    let sync_aggregate = signer.sign(
        config,
        &attested_header.root(),
        signature_slot,
        participants,
    );
    OptimisticUpdate {
        attested_header,
        sync_aggregate,
        signature_slot,
    }
}

/// A Deneb payload with every list non-empty.
pub fn sample_payload() -> ExecutionPayload {
    ExecutionPayload {
        parent_hash: H256([1; 32]),
        fee_recipient: H160([2; 20]),
        state_root: H256([3; 32]),
        receipts_root: H256([4; 32]),
        logs_bloom: FixedVector::from(vec![0u8; 256]),
        prev_randao: H256([5; 32]),
        block_number: 19_000_000,
        gas_limit: 30_000_000,
        gas_used: 12_345_678,
        timestamp: 1_700_000_000,
        extra_data: VariableList::from(b"oplite".to_vec()),
        base_fee_per_gas: U256::from(7_000_000_000u64),
        block_hash: H256([6; 32]),
        transactions: VariableList::from(vec![
            VariableList::from(vec![0x02, 0xf8, 0x70]),
            VariableList::from(vec![0xde; 40]),
        ]),
        withdrawals: VariableList::from(vec![Withdrawal {
            index: 1,
            validator_index: 2,
            address: H160([7; 20]),
            amount: 32,
        }]),
        blob_gas_used: 131_072,
        excess_blob_gas: 0,
    }
}

/// A Deneb body wrapping `sample_payload`.
pub fn sample_body() -> BeaconBlockBody {
    let mut aggregation_bits = BitList::with_capacity(8).expect("within limit");
    for i in 0..8 {
        aggregation_bits.set(i, true).expect("within length");
    }
    BeaconBlockBody {
        randao_reveal: BlsSignature([9; 96]),
        eth1_data: Eth1Data::default(),
        graffiti: H256::zero(),
        proposer_slashings: VariableList::empty(),
        attester_slashings: VariableList::empty(),
        attestations: VariableList::from(vec![Attestation {
            aggregation_bits,
            data: AttestationData::default(),
            signature: BlsSignature::default(),
        }]),
        deposits: VariableList::empty(),
        voluntary_exits: VariableList::empty(),
        sync_aggregate: SyncAggregate {
            sync_committee_bits: vec![0xff; 64],
            sync_committee_signature: BlsSignature::default(),
        },
        execution_payload: sample_payload(),
        bls_to_execution_changes: VariableList::empty(),
        blob_kzg_commitments: VariableList::from(vec![KzgCommitment([0xaa; KZG_COMMITMENT_LEN])]),
    }
}

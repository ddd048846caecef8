//! Deneb beacon block body.
//!
//! Committees sign headers, not bodies. The execution payload is trusted only
//! after the body's `tree_hash_root` reproduces the signed header's
//! `body_root`, so list limits and field order here follow the mainnet Deneb
//! containers exactly.

use alloy_primitives::B256;
use ethereum_types::{H160, H256, U256};
use serde::{Deserialize, Serialize};
use ssz_types::typenum::{U1048576, U1073741824, U128, U16, U2, U2048, U256 as U256Len, U32, U33, U4096};
use ssz_types::{BitList, FixedVector, VariableList};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

use crate::merkle::Root;
use crate::types::beacon::{impl_fixed_bytes, BeaconBlockHeader, BlsPublicKey, BlsSignature, SyncAggregate};
use crate::types::serde_utils::{
    decimal_u256, hex_byte_list, hex_byte_lists, hex_byte_vector, quoted_u64, quoted_u64_list,
};

pub const KZG_COMMITMENT_LEN: usize = 48;

pub type Transaction = VariableList<u8, U1073741824>;
pub type Transactions = VariableList<Transaction, U1048576>;

/// The execution block a verified header points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionInfo {
    pub block_hash: B256,
    pub block_number: u64,
}

/// A KZG commitment to a blob (48 bytes, compressed G1 point).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KzgCommitment(pub [u8; KZG_COMMITMENT_LEN]);

impl_fixed_bytes!(KzgCommitment, KZG_COMMITMENT_LEN);

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, TreeHash)]
pub struct Eth1Data {
    pub deposit_root: H256,
    #[serde(with = "quoted_u64")]
    pub deposit_count: u64,
    pub block_hash: H256,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, TreeHash)]
pub struct SignedBeaconBlockHeader {
    pub message: BeaconBlockHeader,
    pub signature: BlsSignature,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, TreeHash)]
pub struct ProposerSlashing {
    pub signed_header_1: SignedBeaconBlockHeader,
    pub signed_header_2: SignedBeaconBlockHeader,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, TreeHash)]
pub struct Checkpoint {
    #[serde(with = "quoted_u64")]
    pub epoch: u64,
    pub root: H256,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, TreeHash)]
pub struct AttestationData {
    #[serde(with = "quoted_u64")]
    pub slot: u64,
    #[serde(with = "quoted_u64")]
    pub index: u64,
    pub beacon_block_root: H256,
    pub source: Checkpoint,
    pub target: Checkpoint,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, TreeHash)]
pub struct IndexedAttestation {
    #[serde(with = "quoted_u64_list")]
    pub attesting_indices: VariableList<u64, U2048>,
    pub data: AttestationData,
    pub signature: BlsSignature,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, TreeHash)]
pub struct AttesterSlashing {
    pub attestation_1: IndexedAttestation,
    pub attestation_2: IndexedAttestation,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, TreeHash)]
pub struct Attestation {
    pub aggregation_bits: BitList<U2048>,
    pub data: AttestationData,
    pub signature: BlsSignature,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, TreeHash)]
pub struct DepositData {
    pub pubkey: BlsPublicKey,
    pub withdrawal_credentials: H256,
    #[serde(with = "quoted_u64")]
    pub amount: u64,
    pub signature: BlsSignature,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TreeHash)]
pub struct Deposit {
    /// Deposit contract tree depth plus the length mix-in.
    pub proof: FixedVector<H256, U33>,
    pub data: DepositData,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, TreeHash)]
pub struct VoluntaryExit {
    #[serde(with = "quoted_u64")]
    pub epoch: u64,
    #[serde(with = "quoted_u64")]
    pub validator_index: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, TreeHash)]
pub struct SignedVoluntaryExit {
    pub message: VoluntaryExit,
    pub signature: BlsSignature,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, TreeHash)]
pub struct BlsToExecutionChange {
    #[serde(with = "quoted_u64")]
    pub validator_index: u64,
    pub from_bls_pubkey: BlsPublicKey,
    pub to_execution_address: H160,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, TreeHash)]
pub struct SignedBlsToExecutionChange {
    pub message: BlsToExecutionChange,
    pub signature: BlsSignature,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, TreeHash)]
pub struct Withdrawal {
    #[serde(with = "quoted_u64")]
    pub index: u64,
    #[serde(with = "quoted_u64")]
    pub validator_index: u64,
    pub address: H160,
    #[serde(with = "quoted_u64")]
    pub amount: u64,
}

/// Deneb execution payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TreeHash)]
pub struct ExecutionPayload {
    pub parent_hash: H256,
    pub fee_recipient: H160,
    pub state_root: H256,
    pub receipts_root: H256,
    #[serde(with = "hex_byte_vector")]
    pub logs_bloom: FixedVector<u8, U256Len>,
    pub prev_randao: H256,
    #[serde(with = "quoted_u64")]
    pub block_number: u64,
    #[serde(with = "quoted_u64")]
    pub gas_limit: u64,
    #[serde(with = "quoted_u64")]
    pub gas_used: u64,
    #[serde(with = "quoted_u64")]
    pub timestamp: u64,
    #[serde(with = "hex_byte_list")]
    pub extra_data: VariableList<u8, U32>,
    #[serde(with = "decimal_u256")]
    pub base_fee_per_gas: U256,
    pub block_hash: H256,
    #[serde(with = "hex_byte_lists")]
    pub transactions: Transactions,
    pub withdrawals: VariableList<Withdrawal, U16>,
    #[serde(with = "quoted_u64")]
    pub blob_gas_used: u64,
    #[serde(with = "quoted_u64")]
    pub excess_blob_gas: u64,
}

impl ExecutionPayload {
    pub fn execution_info(&self) -> ExecutionInfo {
        ExecutionInfo {
            block_hash: B256::from(self.block_hash.0),
            block_number: self.block_number,
        }
    }
}

/// Deneb beacon block body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TreeHash)]
pub struct BeaconBlockBody {
    pub randao_reveal: BlsSignature,
    pub eth1_data: Eth1Data,
    pub graffiti: H256,
    pub proposer_slashings: VariableList<ProposerSlashing, U16>,
    pub attester_slashings: VariableList<AttesterSlashing, U2>,
    pub attestations: VariableList<Attestation, U128>,
    pub deposits: VariableList<Deposit, U16>,
    pub voluntary_exits: VariableList<SignedVoluntaryExit, U16>,
    pub sync_aggregate: SyncAggregate,
    pub execution_payload: ExecutionPayload,
    pub bls_to_execution_changes: VariableList<SignedBlsToExecutionChange, U16>,
    pub blob_kzg_commitments: VariableList<KzgCommitment, U4096>,
}

impl BeaconBlockBody {
    pub fn root(&self) -> Root {
        self.tree_hash_root().0
    }
}

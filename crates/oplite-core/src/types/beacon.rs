use bitvec::prelude::*;
use ethereum_types::H256;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash::{merkle_root, Hash256, PackedEncoding, TreeHash, TreeHashType};
use tree_hash_derive::TreeHash;

use crate::merkle::Root;
use crate::types::serde_utils::{hex_bytes, quoted_u64};

/// A beacon chain slot.
pub type Slot = u64;

/// A sync committee period: a fixed run of epochs with a constant committee.
pub type SyncPeriod = u64;

/// Number of bytes in a BLS12-381 public key (compressed).
pub const BLS_PUBKEY_LEN: usize = 48;

/// Number of bytes in a BLS12-381 signature (compressed).
pub const BLS_SIGNATURE_LEN: usize = 96;

/// Domain type for sync committee signatures.
pub const DOMAIN_SYNC_COMMITTEE: [u8; 4] = [0x07, 0x00, 0x00, 0x00];

/// Hex JSON, SSZ `ByteVector[N]` encoding and root for a fixed-size byte
/// newtype.
macro_rules! impl_fixed_bytes {
    ($name:ident, $len:expr) => {
        impl $name {
            pub fn from_bytes(bytes: &[u8]) -> Result<Self, &'static str> {
                let arr: [u8; $len] = bytes
                    .try_into()
                    .map_err(|_| concat!("Invalid ", stringify!($name), " length"))?;
                Ok(Self(arr))
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&format!("0x{}", ::hex::encode(self.0)))
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                let s = s.strip_prefix("0x").unwrap_or(&s);
                let bytes = ::hex::decode(s).map_err(::serde::de::Error::custom)?;
                Self::from_bytes(&bytes).map_err(::serde::de::Error::custom)
            }
        }

        impl ::ssz::Encode for $name {
            fn is_ssz_fixed_len() -> bool {
                true
            }

            fn ssz_fixed_len() -> usize {
                $len
            }

            fn ssz_append(&self, buf: &mut Vec<u8>) {
                buf.extend_from_slice(&self.0);
            }

            fn ssz_bytes_len(&self) -> usize {
                $len
            }
        }

        impl ::ssz::Decode for $name {
            fn is_ssz_fixed_len() -> bool {
                true
            }

            fn ssz_fixed_len() -> usize {
                $len
            }

            fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, ::ssz::DecodeError> {
                Self::from_bytes(bytes).map_err(|_| ::ssz::DecodeError::InvalidByteLength {
                    len: bytes.len(),
                    expected: $len,
                })
            }
        }

        impl ::tree_hash::TreeHash for $name {
            fn tree_hash_type() -> ::tree_hash::TreeHashType {
                ::tree_hash::TreeHashType::Vector
            }

            fn tree_hash_packed_encoding(&self) -> ::tree_hash::PackedEncoding {
                ::tree_hash::PackedEncoding::from_slice(&self.0)
            }

            fn tree_hash_packing_factor() -> usize {
                1
            }

            fn tree_hash_root(&self) -> ::tree_hash::Hash256 {
                ::tree_hash::merkle_root(&self.0, $len.div_ceil(::tree_hash::BYTES_PER_CHUNK))
            }
        }
    };
}

pub(crate) use impl_fixed_bytes;

/// Root of a container given its field roots in declaration order.
fn container_root(fields: &[Hash256]) -> Hash256 {
    let leaves: Vec<u8> = fields.iter().flat_map(|field| field.0).collect();
    merkle_root(&leaves, fields.len())
}

/// A BLS12-381 public key (48 bytes, compressed G1 point).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlsPublicKey(pub [u8; BLS_PUBKEY_LEN]);

impl_fixed_bytes!(BlsPublicKey, BLS_PUBKEY_LEN);

/// A BLS12-381 signature (96 bytes, compressed G2 point).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlsSignature(pub [u8; BLS_SIGNATURE_LEN]);

impl Default for BlsSignature {
    fn default() -> Self {
        Self([0u8; BLS_SIGNATURE_LEN])
    }
}

impl_fixed_bytes!(BlsSignature, BLS_SIGNATURE_LEN);

/// A beacon chain block header.
/// Its root is what the sync committee signs (through the signing domain).
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode, TreeHash,
)]
pub struct BeaconBlockHeader {
    #[serde(with = "quoted_u64")]
    pub slot: Slot,
    #[serde(with = "quoted_u64")]
    pub proposer_index: u64,
    pub parent_root: H256,
    pub state_root: H256,
    /// Root of the block body; binds the execution payload to the signed header.
    pub body_root: H256,
}

impl BeaconBlockHeader {
    /// An all-zero header marks "absent" in fixed-size SSZ containers.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn root(&self) -> Root {
        self.tree_hash_root().0
    }
}

/// The sync committee that signs headers for one period.
///
/// The member count is a chain parameter, so the SSZ root is computed here
/// rather than derived over a type-level length.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCommittee {
    pub pubkeys: Vec<BlsPublicKey>,
    /// Aggregate of all member keys, kept because it is part of the committee root.
    pub aggregate_pubkey: BlsPublicKey,
}

impl SyncCommittee {
    /// Validate the committee has the chain's number of members.
    pub fn validate(&self, committee_size: usize) -> Result<(), &'static str> {
        if self.pubkeys.len() != committee_size {
            return Err("Sync committee has the wrong number of members");
        }
        Ok(())
    }
}

impl TreeHash for SyncCommittee {
    fn tree_hash_type() -> TreeHashType {
        TreeHashType::Container
    }

    fn tree_hash_packed_encoding(&self) -> PackedEncoding {
        PackedEncoding::from_slice(self.tree_hash_root().as_bytes())
    }

    fn tree_hash_packing_factor() -> usize {
        1
    }

    fn tree_hash_root(&self) -> Hash256 {
        let pubkey_roots: Vec<u8> = self
            .pubkeys
            .iter()
            .flat_map(|pk| pk.tree_hash_root().0)
            .collect();
        container_root(&[
            merkle_root(&pubkey_roots, self.pubkeys.len()),
            self.aggregate_pubkey.tree_hash_root(),
        ])
    }
}

/// The aggregate BLS signature from the sync committee, with a bitvector of
/// which members signed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAggregate {
    /// Bit `i` (LSB-first within each byte) is set when member `i` signed.
    #[serde(with = "hex_bytes")]
    pub sync_committee_bits: Vec<u8>,
    pub sync_committee_signature: BlsSignature,
}

impl SyncAggregate {
    /// Count how many sync committee members participated (set bits).
    pub fn num_participants(&self) -> usize {
        self.sync_committee_bits.view_bits::<Lsb0>().count_ones()
    }

    /// Check if a specific committee member (by index) participated.
    pub fn has_participant(&self, index: usize) -> bool {
        self.sync_committee_bits
            .view_bits::<Lsb0>()
            .get(index)
            .map(|bit| *bit)
            .unwrap_or(false)
    }

    /// Get the indices of all participating committee members.
    pub fn participant_indices(&self) -> Vec<usize> {
        self.sync_committee_bits.view_bits::<Lsb0>().iter_ones().collect()
    }
}

impl TreeHash for SyncAggregate {
    fn tree_hash_type() -> TreeHashType {
        TreeHashType::Container
    }

    fn tree_hash_packed_encoding(&self) -> PackedEncoding {
        PackedEncoding::from_slice(self.tree_hash_root().as_bytes())
    }

    fn tree_hash_packing_factor() -> usize {
        1
    }

    fn tree_hash_root(&self) -> Hash256 {
        // Bitvector[size]: packed bits, no length mix-in.
        container_root(&[
            merkle_root(&self.sync_committee_bits, 0),
            self.sync_committee_signature.tree_hash_root(),
        ])
    }
}

/// A light client update: a prover's claim that `attested_header` was signed
/// by the current committee and that `next_sync_committee` follows it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LightClientUpdate {
    pub attested_header: BeaconBlockHeader,
    pub next_sync_committee: SyncCommittee,
    /// Merkle branch proving `next_sync_committee` against the attested state root.
    pub next_sync_committee_branch: Vec<Root>,
    /// All-zero when the update carries no finality information.
    pub finalized_header: BeaconBlockHeader,
    pub finality_branch: Vec<Root>,
    pub sync_aggregate: SyncAggregate,
    pub signature_slot: Slot,
}

/// A lighter update without committee transition, used to follow the head.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptimisticUpdate {
    pub attested_header: BeaconBlockHeader,
    pub sync_aggregate: SyncAggregate,
    pub signature_slot: Slot,
}

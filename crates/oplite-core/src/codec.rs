//! SSZ serialization of the values provers exchange.
//!
//! Every layout is fixed-size for a given committee size, so decoding is a
//! length check followed by sequential `ssz::Decode` reads. The committee size
//! is a chain parameter, which is why the update is composed here field by
//! field instead of derived over type-level lengths.

use ssz::{Decode, DecodeError, Encode};
use thiserror::Error;

use crate::consensus::transition::{FINALIZED_ROOT_DEPTH, NEXT_SYNC_COMMITTEE_DEPTH};
use crate::merkle::Root;
use crate::types::beacon::*;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SszError {
    #[error("Invalid {what} length: expected {expected} bytes, got {got}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Invalid {what} length: {got} is not a multiple of {unit}")]
    NotMultiple {
        what: &'static str,
        unit: usize,
        got: usize,
    },

    #[error("SSZ decode error: {0}")]
    Decode(String),
}

impl From<DecodeError> for SszError {
    fn from(err: DecodeError) -> Self {
        SszError::Decode(format!("{err:?}"))
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], SszError> {
        if self.bytes.len() < n {
            return Err(SszError::InvalidLength {
                what: "field",
                expected: n,
                got: self.bytes.len(),
            });
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Ok(head)
    }

    fn read<T: Decode>(&mut self) -> Result<T, SszError> {
        let bytes = self.take(<T as Decode>::ssz_fixed_len())?;
        Ok(T::from_ssz_bytes(bytes)?)
    }

    fn read_vec<T: Decode>(&mut self, count: usize) -> Result<Vec<T>, SszError> {
        let bytes = self.take(count * <T as Decode>::ssz_fixed_len())?;
        Ok(Vec::<T>::from_ssz_bytes(bytes)?)
    }
}

fn check_len(what: &'static str, bytes: &[u8], expected: usize) -> Result<(), SszError> {
    if bytes.len() != expected {
        return Err(SszError::InvalidLength {
            what,
            expected,
            got: bytes.len(),
        });
    }
    Ok(())
}

/// `Vector[BLSPubkey, size]`
pub fn encode_committee(pubkeys: &[BlsPublicKey]) -> Vec<u8> {
    pubkeys.to_vec().as_ssz_bytes()
}

pub fn decode_committee(bytes: &[u8], committee_size: usize) -> Result<Vec<BlsPublicKey>, SszError> {
    check_len("committee", bytes, committee_size * BLS_PUBKEY_LEN)?;
    Reader { bytes }.read_vec(committee_size)
}

/// `List[Bytes32, N]` serialized without a length prefix.
pub fn encode_hashes(hashes: &[Root]) -> Vec<u8> {
    hashes.to_vec().as_ssz_bytes()
}

pub fn decode_hashes(bytes: &[u8]) -> Result<Vec<Root>, SszError> {
    if bytes.len() % 32 != 0 {
        return Err(SszError::NotMultiple {
            what: "hashes",
            unit: 32,
            got: bytes.len(),
        });
    }
    Ok(Vec::<Root>::from_ssz_bytes(bytes)?)
}

/// Serialized size of an altair `LightClientUpdate` for a committee size.
pub fn update_len(committee_size: usize) -> usize {
    let header_len = <BeaconBlockHeader as Decode>::ssz_fixed_len();
    header_len
        + (committee_size + 1) * BLS_PUBKEY_LEN
        + NEXT_SYNC_COMMITTEE_DEPTH * 32
        + header_len
        + FINALIZED_ROOT_DEPTH * 32
        + committee_size / 8
        + BLS_SIGNATURE_LEN
        + 8
}

pub fn encode_update(update: &LightClientUpdate) -> Vec<u8> {
    let size = update.next_sync_committee.pubkeys.len();
    let mut out = Vec::with_capacity(update_len(size));
    update.attested_header.ssz_append(&mut out);
    out.extend(encode_committee(&update.next_sync_committee.pubkeys));
    update.next_sync_committee.aggregate_pubkey.ssz_append(&mut out);
    out.extend(encode_hashes(&update.next_sync_committee_branch));
    update.finalized_header.ssz_append(&mut out);
    out.extend(encode_hashes(&update.finality_branch));
    out.extend_from_slice(&update.sync_aggregate.sync_committee_bits);
    update.sync_aggregate.sync_committee_signature.ssz_append(&mut out);
    update.signature_slot.ssz_append(&mut out);
    out
}

pub fn decode_update(bytes: &[u8], committee_size: usize) -> Result<LightClientUpdate, SszError> {
    check_len("update", bytes, update_len(committee_size))?;
    let mut reader = Reader { bytes };
    Ok(LightClientUpdate {
        attested_header: reader.read()?,
        next_sync_committee: SyncCommittee {
            pubkeys: reader.read_vec(committee_size)?,
            aggregate_pubkey: reader.read()?,
        },
        next_sync_committee_branch: reader.read_vec(NEXT_SYNC_COMMITTEE_DEPTH)?,
        finalized_header: reader.read()?,
        finality_branch: reader.read_vec(FINALIZED_ROOT_DEPTH)?,
        sync_aggregate: SyncAggregate {
            sync_committee_bits: reader.take(committee_size / 8)?.to_vec(),
            sync_committee_signature: reader.read()?,
        },
        signature_slot: reader.read()?,
    })
}

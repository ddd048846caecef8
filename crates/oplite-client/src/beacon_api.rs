//! Beacon API JSON format adapter.
//!
//! The core types already deserialize from the API's field encodings (quoted
//! integers, 0x-prefixed hex). What differs is the framing:
//! - responses are wrapped in `{ "data": ... }`
//! - capella+ light client headers nest the beacon header as `{ "beacon": ... }`
//!   next to execution fields we do not use; altair/bellatrix send it bare
//! - blocks arrive signed, as `{ "message": { "slot", "body", ... }, "signature" }`

use oplite_core::types::serde_utils::{hex_fixed_vec, quoted_u64};
use oplite_core::{
    BeaconBlockBody, BeaconBlockHeader, LightClientUpdate, OptimisticUpdate, Root, Slot,
    SyncAggregate, SyncCommittee,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiLightClientHeader {
    Nested { beacon: BeaconBlockHeader },
    Bare(BeaconBlockHeader),
}

impl ApiLightClientHeader {
    pub fn into_beacon(self) -> BeaconBlockHeader {
        match self {
            Self::Nested { beacon } => beacon,
            Self::Bare(beacon) => beacon,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiOptimisticUpdate {
    pub attested_header: ApiLightClientHeader,
    pub sync_aggregate: SyncAggregate,
    #[serde(with = "quoted_u64")]
    pub signature_slot: Slot,
}

impl ApiOptimisticUpdate {
    pub fn into_core(self) -> OptimisticUpdate {
        OptimisticUpdate {
            attested_header: self.attested_header.into_beacon(),
            sync_aggregate: self.sync_aggregate,
            signature_slot: self.signature_slot,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiLightClientUpdate {
    pub attested_header: ApiLightClientHeader,
    pub next_sync_committee: SyncCommittee,
    #[serde(with = "hex_fixed_vec")]
    pub next_sync_committee_branch: Vec<Root>,
    pub finalized_header: ApiLightClientHeader,
    #[serde(with = "hex_fixed_vec")]
    pub finality_branch: Vec<Root>,
    pub sync_aggregate: SyncAggregate,
    #[serde(with = "quoted_u64")]
    pub signature_slot: Slot,
}

impl ApiLightClientUpdate {
    pub fn into_core(self) -> LightClientUpdate {
        LightClientUpdate {
            attested_header: self.attested_header.into_beacon(),
            next_sync_committee: self.next_sync_committee,
            next_sync_committee_branch: self.next_sync_committee_branch,
            finalized_header: self.finalized_header.into_beacon(),
            finality_branch: self.finality_branch,
            sync_aggregate: self.sync_aggregate,
            signature_slot: self.signature_slot,
        }
    }
}

/// `GET /eth/v1/beacon/light_client/updates` returns a bare array of
/// versioned envelopes.
pub type ApiUpdatesResponse = Vec<ApiResponse<ApiLightClientUpdate>>;

#[derive(Debug, Deserialize)]
pub struct ApiSignedBeaconBlock {
    pub message: ApiBeaconBlock,
}

#[derive(Debug, Deserialize)]
pub struct ApiBeaconBlock {
    #[serde(with = "quoted_u64")]
    pub slot: Slot,
    pub body: BeaconBlockBody,
}

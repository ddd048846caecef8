//! Scripted collaborators and chain fixtures shared by the client tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use oplite_core::testing::{build_optimistic_update, build_update, sample_body, TestCommittee};
use oplite_core::{
    committee_hash, BeaconBlockBody, BlsPublicKey, ChainConfig, LightClientUpdate, OptimisticUpdate,
    Root, Slot, SyncPeriod, H256,
};
use parking_lot::Mutex;

use crate::client::{SequentialSync, SyncContext, SyncStrategy};
use crate::error::ProverError;
use crate::feed::BeaconFeed;
use crate::network::NetworkError;
use crate::prover::{PeriodRequest, Prover};
use crate::store::{MemoryStore, Store};

pub const COMMITTEE_SIZE: usize = 32;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// UNIX time at the first slot of `period`.
pub fn time_at_period(chain: &ChainConfig, period: SyncPeriod) -> u64 {
    chain.genesis_time + period * chain.slots_per_period() * chain.seconds_per_slot
}

/// Committee of a fake chain that forks off with `seed`.
fn fake_committee(seed: u64, period: SyncPeriod) -> TestCommittee {
    TestCommittee::generate((seed << 32) | period, COMMITTEE_SIZE)
}

/// A prover answering from a fixed lineage of committees and updates.
pub struct ScriptedProver {
    committees: BTreeMap<SyncPeriod, Vec<BlsPublicKey>>,
    updates: BTreeMap<SyncPeriod, LightClientUpdate>,
    offline: AtomicBool,
    update_requests: Mutex<Vec<SyncPeriod>>,
}

impl ScriptedProver {
    /// The real chain: committees `start..=end`, updates `start..end`.
    pub fn honest(chain: &ChainConfig, start: SyncPeriod, end: SyncPeriod) -> Self {
        Self::forked(chain, start, end, end + 1, 0)
    }

    /// The real chain up to `fork - 1`, then committees of a fake chain. The
    /// update for `fork - 1` is signed by a committee the real chain never
    /// had, so it cannot verify.
    pub fn forked(
        chain: &ChainConfig,
        start: SyncPeriod,
        end: SyncPeriod,
        fork: SyncPeriod,
        seed: u64,
    ) -> Self {
        let committee_at = |period: SyncPeriod| {
            if period < fork {
                TestCommittee::generate(period, COMMITTEE_SIZE)
            } else {
                fake_committee(seed, period)
            }
        };
        let committees = (start..=end)
            .map(|period| (period, committee_at(period).pubkeys))
            .collect();
        let updates = (start..end)
            .map(|period| {
                let signer = if period + 1 < fork {
                    committee_at(period)
                } else {
                    fake_committee(seed, period)
                };
                let next = committee_at(period + 1).committee();
                (period, build_update(chain, &signer, period, &next, COMMITTEE_SIZE))
            })
            .collect();
        Self {
            committees,
            updates,
            offline: AtomicBool::new(false),
            update_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn committee_hash(&self, period: SyncPeriod) -> Option<Root> {
        self.committees.get(&period).map(|c| committee_hash(c))
    }

    /// Periods of every update requested so far, in order.
    pub fn requested_updates(&self) -> Vec<SyncPeriod> {
        self.update_requests.lock().clone()
    }

    fn check_online(&self) -> Result<(), ProverError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::RequestFailed {
                url: "scripted://prover".to_string(),
                reason: "offline".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl Prover for ScriptedProver {
    async fn get_committee(&self, period: PeriodRequest) -> Result<Vec<BlsPublicKey>, ProverError> {
        self.check_online()?;
        let committee = match period {
            PeriodRequest::Period(p) => self.committees.get(&p),
            PeriodRequest::Latest => self.committees.values().next_back(),
        };
        committee.cloned().ok_or(ProverError::NotFound {
            what: "committee",
            period,
        })
    }

    async fn get_sync_update(
        &self,
        period: SyncPeriod,
        _current_period: SyncPeriod,
        _batch_size: usize,
    ) -> Result<LightClientUpdate, ProverError> {
        self.check_online()?;
        self.update_requests.lock().push(period);
        self.updates.get(&period).cloned().ok_or(ProverError::NotFound {
            what: "update",
            period: period.into(),
        })
    }

    async fn get_committee_hash(
        &self,
        period: SyncPeriod,
        _current_period: SyncPeriod,
        _cache_count: usize,
    ) -> Result<Option<Root>, ProverError> {
        self.check_online()?;
        Ok(self.committee_hash(period))
    }
}

/// A beacon feed serving heads in the order pushed. The last head stays
/// current once the others are consumed.
#[derive(Default)]
pub struct ScriptedFeed {
    heads: Mutex<VecDeque<OptimisticUpdate>>,
    bodies: Mutex<HashMap<Slot, BeaconBlockBody>>,
    update_fetches: AtomicUsize,
}

impl ScriptedFeed {
    /// Queue `update` and serve `body` for its slot.
    pub fn push(&self, update: OptimisticUpdate, body: BeaconBlockBody) {
        self.bodies.lock().insert(update.attested_header.slot, body);
        self.heads.lock().push_back(update);
    }

    pub fn update_fetches(&self) -> usize {
        self.update_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BeaconFeed for ScriptedFeed {
    async fn fetch_optimistic_update(&self) -> Result<OptimisticUpdate, ProverError> {
        self.update_fetches.fetch_add(1, Ordering::SeqCst);
        let mut heads = self.heads.lock();
        let head = if heads.len() > 1 {
            heads.pop_front()
        } else {
            heads.front().cloned()
        };
        head.ok_or(ProverError::Decode {
            what: "optimistic update",
            reason: "no head scripted".to_string(),
        })
    }

    async fn fetch_block_body(&self, slot: Slot) -> Result<BeaconBlockBody, ProverError> {
        self.bodies.lock().get(&slot).cloned().ok_or(ProverError::Decode {
            what: "beacon block",
            reason: format!("no block scripted at slot {slot}"),
        })
    }
}

/// A head at `slot` for execution block `block_number`, signed by
/// `participants` members of `signer`.
pub fn signed_head_with(
    chain: &ChainConfig,
    signer: &TestCommittee,
    slot: Slot,
    block_number: u64,
    participants: usize,
) -> (OptimisticUpdate, BeaconBlockBody) {
    let mut body = sample_body();
    body.execution_payload.block_number = block_number;
    body.execution_payload.block_hash = H256([block_number as u8; 32]);
    let update = build_optimistic_update(chain, signer, slot, body.root(), participants);
    (update, body)
}

/// A head signed by the whole of `signer`.
pub fn signed_head(
    chain: &ChainConfig,
    signer: &TestCommittee,
    slot: Slot,
    block_number: u64,
) -> (OptimisticUpdate, BeaconBlockBody) {
    signed_head_with(chain, signer, slot, block_number, COMMITTEE_SIZE)
}

/// A store filled by a sequential sync from `from` to `to` against the real
/// chain.
pub async fn sequential_sync_into_store(
    chain: &ChainConfig,
    genesis: &TestCommittee,
    from: SyncPeriod,
    to: SyncPeriod,
) -> Arc<dyn Store> {
    let store = Arc::new(MemoryStore::new());
    let strategy = SequentialSync::new(vec![Arc::new(ScriptedProver::honest(chain, from, to))])
        .with_store(store.clone());
    let ctx = SyncContext {
        chain,
        batch_size: 4,
        trusted_period: from,
        trusted_committee: &genesis.pubkeys,
        current_period: to,
    };
    strategy.sync_to(&ctx).await.expect("honest sync");
    store
}

/// A light client update in the beacon API's `{ "version", "data" }` envelope,
/// with capella+ nested headers.
pub fn api_update_json(update: &LightClientUpdate) -> serde_json::Value {
    let branch = |nodes: &[Root]| -> Vec<String> {
        nodes.iter().map(|node| format!("0x{}", hex::encode(node))).collect()
    };
    serde_json::json!({
        "version": "deneb",
        "data": {
            "attested_header": { "beacon": update.attested_header },
            "next_sync_committee": update.next_sync_committee,
            "next_sync_committee_branch": branch(&update.next_sync_committee_branch),
            "finalized_header": { "beacon": update.finalized_header },
            "finality_branch": branch(&update.finality_branch),
            "sync_aggregate": update.sync_aggregate,
            "signature_slot": update.signature_slot.to_string(),
        }
    })
}

/// An optimistic update as served by `/eth/v1/beacon/light_client/optimistic_update`.
pub fn api_optimistic_update_json(update: &OptimisticUpdate) -> serde_json::Value {
    serde_json::json!({
        "version": "deneb",
        "data": {
            "attested_header": { "beacon": update.attested_header },
            "sync_aggregate": update.sync_aggregate,
            "signature_slot": update.signature_slot.to_string(),
        }
    })
}

/// A signed block as served by `/eth/v2/beacon/blocks/{slot}`.
pub fn api_block_json(slot: Slot, body: &BeaconBlockBody) -> serde_json::Value {
    serde_json::json!({
        "version": "deneb",
        "data": {
            "message": {
                "slot": slot.to_string(),
                "proposer_index": "1",
                "body": body,
            },
            "signature": format!("0x{}", "00".repeat(96)),
        }
    })
}

use std::sync::Arc;

use async_trait::async_trait;
use oplite_core::codec::{decode_committee, decode_hashes, decode_update};
use oplite_core::{BlsPublicKey, LightClientUpdate, Root, SyncPeriod};

use super::{batch_count, PeriodRequest, Prover};
use crate::error::{ProverError, StoreError};
use crate::store::Store;

/// In-process prover serving a `Store`, the same bytes a prover server would.
pub struct StoreProver {
    store: Arc<dyn Store>,
    committee_size: usize,
}

impl StoreProver {
    pub fn new(store: Arc<dyn Store>, committee_size: usize) -> Self {
        Self {
            store,
            committee_size,
        }
    }
}

#[async_trait]
impl Prover for StoreProver {
    async fn get_committee(&self, period: PeriodRequest) -> Result<Vec<BlsPublicKey>, ProverError> {
        let period = match period {
            PeriodRequest::Period(period) => period,
            PeriodRequest::Latest => self.store.latest_period().ok_or(ProverError::NotFound {
                what: "committee",
                period,
            })?,
        };
        let bytes = self.store.get_committee(period)?;
        Ok(decode_committee(&bytes, self.committee_size)?)
    }

    async fn get_sync_update(
        &self,
        period: SyncPeriod,
        _current_period: SyncPeriod,
        _batch_size: usize,
    ) -> Result<LightClientUpdate, ProverError> {
        let bytes = self.store.get_update(period)?;
        Ok(decode_update(&bytes, self.committee_size)?)
    }

    async fn get_committee_hash(
        &self,
        period: SyncPeriod,
        current_period: SyncPeriod,
        cache_count: usize,
    ) -> Result<Option<Root>, ProverError> {
        let count = batch_count(period, current_period, cache_count);
        match self.store.get_committee_hashes(period, count) {
            Ok(bytes) => Ok(decode_hashes(&bytes)?.first().copied()),
            Err(StoreError::Missing { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

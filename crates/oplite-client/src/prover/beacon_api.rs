//! Prover backed directly by a beacon node's light client API.
//!
//! Used on the trusted side (the client that feeds a store and a prover
//! server). Updates are fetched in batches and cached by period; committees
//! and committee hashes are derived from the cached updates.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use oplite_core::{
    committee_hash, period_at_slot, BlsPublicKey, ChainConfig, LightClientUpdate, Root,
    SyncPeriod,
};
use parking_lot::Mutex;
use tracing::debug;

use super::{batch_count, PeriodRequest, Prover};
use crate::beacon_api::ApiUpdatesResponse;
use crate::error::ProverError;
use crate::network::{join_url, HttpTransport, NetworkError};

/// Most updates a beacon node serves per request.
pub const MAX_REQUEST_LIGHT_CLIENT_UPDATES: usize = 128;

pub struct BeaconApiProver {
    beacon_url: String,
    transport: HttpTransport,
    chain: ChainConfig,
    updates: Mutex<BTreeMap<SyncPeriod, LightClientUpdate>>,
}

impl BeaconApiProver {
    pub fn new(
        beacon_url: impl Into<String>,
        chain: ChainConfig,
        timeout: Duration,
    ) -> Result<Self, NetworkError> {
        Ok(Self {
            beacon_url: beacon_url.into(),
            transport: HttpTransport::new(timeout)?,
            chain,
            updates: Mutex::new(BTreeMap::new()),
        })
    }

    async fn fetch_updates(&self, start_period: SyncPeriod, count: usize) -> Result<(), ProverError> {
        let url = join_url(
            &self.beacon_url,
            &format!("/eth/v1/beacon/light_client/updates?start_period={start_period}&count={count}"),
        );
        let resp: ApiUpdatesResponse = self.transport.fetch_json(&url).await?;
        debug!(start_period, count, received = resp.len(), "Fetched light client updates");

        let mut updates = self.updates.lock();
        for envelope in resp {
            let update = envelope.data.into_core();
            let period = period_at_slot(&self.chain, update.attested_header.slot).map_err(|e| {
                ProverError::Decode {
                    what: "light client update",
                    reason: e.to_string(),
                }
            })?;
            updates.insert(period, update);
        }
        Ok(())
    }
}

#[async_trait]
impl Prover for BeaconApiProver {
    async fn get_committee(&self, period: PeriodRequest) -> Result<Vec<BlsPublicKey>, ProverError> {
        let not_found = ProverError::NotFound {
            what: "committee",
            period,
        };
        let PeriodRequest::Period(period) = period else {
            return Err(not_found);
        };
        let Some(prev) = period.checked_sub(1) else {
            return Err(not_found);
        };
        let update = self.get_sync_update(prev, period, 1).await?;
        Ok(update.next_sync_committee.pubkeys)
    }

    async fn get_sync_update(
        &self,
        period: SyncPeriod,
        current_period: SyncPeriod,
        batch_size: usize,
    ) -> Result<LightClientUpdate, ProverError> {
        let cached = self.updates.lock().get(&period).cloned();
        if let Some(update) = cached {
            return Ok(update);
        }

        let count = batch_count(
            period,
            current_period,
            batch_size.min(MAX_REQUEST_LIGHT_CLIENT_UPDATES),
        );
        self.fetch_updates(period, count).await?;

        self.updates
            .lock()
            .get(&period)
            .cloned()
            .ok_or(ProverError::NotFound {
                what: "light client update",
                period: PeriodRequest::Period(period),
            })
    }

    async fn get_committee_hash(
        &self,
        period: SyncPeriod,
        current_period: SyncPeriod,
        cache_count: usize,
    ) -> Result<Option<Root>, ProverError> {
        let Some(prev) = period.checked_sub(1) else {
            return Ok(None);
        };
        match self.get_sync_update(prev, current_period, cache_count).await {
            Ok(update) => Ok(Some(committee_hash(&update.next_sync_committee.pubkeys))),
            Err(ProverError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{api_update_json, COMMITTEE_SIZE};
    use httpmock::prelude::*;
    use oplite_core::testing::{build_update, TestCommittee};

    const UPDATES_PATH: &str = "/eth/v1/beacon/light_client/updates";

    fn update_at(chain: &ChainConfig, period: SyncPeriod) -> LightClientUpdate {
        let signer = TestCommittee::generate(period, COMMITTEE_SIZE);
        let next = TestCommittee::generate(period + 1, COMMITTEE_SIZE);
        build_update(chain, &signer, period, &next.committee(), COMMITTEE_SIZE)
    }

    fn prover(server: &MockServer) -> BeaconApiProver {
        BeaconApiProver::new(server.base_url(), ChainConfig::minimal(), Duration::from_secs(5))
            .unwrap()
    }

    #[tokio::test]
    async fn test_committee_comes_from_previous_period_update() {
        let chain = ChainConfig::minimal();
        let server = MockServer::start_async().await;
        let body = serde_json::Value::Array(vec![api_update_json(&update_at(&chain, 5))]);
        let updates = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(UPDATES_PATH)
                    .query_param("start_period", "5")
                    .query_param("count", "1");
                then.status(200).json_body(body);
            })
            .await;

        let prover = prover(&server);
        let expected = TestCommittee::generate(6, COMMITTEE_SIZE);
        assert_eq!(prover.get_committee(6.into()).await.unwrap(), expected.pubkeys);
        assert_eq!(prover.get_committee_hash(6, 6, 4).await.unwrap(), Some(expected.hash()));
        assert_eq!(updates.hits_async().await, 1);

        assert!(matches!(
            prover.get_committee(PeriodRequest::Latest).await,
            Err(ProverError::NotFound { what: "committee", .. })
        ));
    }

    #[tokio::test]
    async fn test_batch_is_keyed_by_attested_period() {
        let chain = ChainConfig::minimal();
        let server = MockServer::start_async().await;
        let body = serde_json::Value::Array(
            (5..8).map(|period| api_update_json(&update_at(&chain, period))).collect(),
        );
        let updates = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(UPDATES_PATH)
                    .query_param("start_period", "5")
                    .query_param("count", "3");
                then.status(200).json_body(body);
            })
            .await;

        let prover = prover(&server);
        for period in [5, 7, 6] {
            let update = prover.get_sync_update(period, 7, 4).await.unwrap();
            assert_eq!(update, update_at(&chain, period));
        }
        assert_eq!(updates.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_missing_update_is_no_claim_but_errors_propagate() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(UPDATES_PATH)
                    .query_param("start_period", "9")
                    .query_param("count", "2");
                then.status(200).json_body(serde_json::json!([]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(UPDATES_PATH)
                    .query_param("start_period", "3");
                then.status(500);
            })
            .await;

        let prover = prover(&server);
        assert_eq!(prover.get_committee_hash(10, 10, 4).await.unwrap(), None);
        assert_eq!(prover.get_committee_hash(0, 10, 4).await.unwrap(), None);
        assert!(matches!(
            prover.get_committee_hash(4, 4, 4).await,
            Err(ProverError::Network(NetworkError::HttpError { status: 500, .. }))
        ));
    }
}

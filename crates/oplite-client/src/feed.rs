//! Source of the chain head: optimistic updates and the block bodies they
//! point at. Untrusted; the client verifies both before using them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use oplite_core::{BeaconBlockBody, OptimisticUpdate, Slot};

use crate::beacon_api::{ApiOptimisticUpdate, ApiResponse, ApiSignedBeaconBlock};
use crate::error::ProverError;
use crate::network::{join_url, HttpTransport, NetworkError};

#[async_trait]
pub trait BeaconFeed: Send + Sync {
    async fn fetch_optimistic_update(&self) -> Result<OptimisticUpdate, ProverError>;

    async fn fetch_block_body(&self, slot: Slot) -> Result<BeaconBlockBody, ProverError>;
}

#[async_trait]
impl<T: BeaconFeed + ?Sized> BeaconFeed for Arc<T> {
    async fn fetch_optimistic_update(&self) -> Result<OptimisticUpdate, ProverError> {
        (**self).fetch_optimistic_update().await
    }

    async fn fetch_block_body(&self, slot: Slot) -> Result<BeaconBlockBody, ProverError> {
        (**self).fetch_block_body(slot).await
    }
}

/// Beacon node REST API feed.
pub struct HttpBeaconFeed {
    beacon_url: String,
    transport: HttpTransport,
}

impl HttpBeaconFeed {
    pub fn new(beacon_url: impl Into<String>, timeout: Duration) -> Result<Self, NetworkError> {
        Ok(Self {
            beacon_url: beacon_url.into(),
            transport: HttpTransport::new(timeout)?,
        })
    }
}

#[async_trait]
impl BeaconFeed for HttpBeaconFeed {
    async fn fetch_optimistic_update(&self) -> Result<OptimisticUpdate, ProverError> {
        let url = join_url(&self.beacon_url, "/eth/v1/beacon/light_client/optimistic_update");
        let resp: ApiResponse<ApiOptimisticUpdate> = self.transport.fetch_json(&url).await?;
        Ok(resp.data.into_core())
    }

    async fn fetch_block_body(&self, slot: Slot) -> Result<BeaconBlockBody, ProverError> {
        let url = join_url(&self.beacon_url, &format!("/eth/v2/beacon/blocks/{slot}"));
        let resp: ApiResponse<ApiSignedBeaconBlock> = self.transport.fetch_json(&url).await?;
        if resp.data.message.slot != slot {
            return Err(ProverError::Decode {
                what: "beacon block",
                reason: format!("requested slot {slot}, got {}", resp.data.message.slot),
            });
        }
        Ok(resp.data.message.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{api_block_json, api_optimistic_update_json, signed_head, COMMITTEE_SIZE};
    use httpmock::prelude::*;
    use oplite_core::testing::{sample_body, TestCommittee};
    use oplite_core::ChainConfig;

    fn feed(server: &MockServer) -> HttpBeaconFeed {
        HttpBeaconFeed::new(server.base_url(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetches_optimistic_update() {
        let chain = ChainConfig::minimal();
        let signer = TestCommittee::generate(101, COMMITTEE_SIZE);
        let (update, _) = signed_head(&chain, &signer, 101 * 64 + 3, 7);
        let server = MockServer::start_async().await;
        let body = api_optimistic_update_json(&update);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/eth/v1/beacon/light_client/optimistic_update");
                then.status(200).json_body(body);
            })
            .await;

        assert_eq!(feed(&server).fetch_optimistic_update().await.unwrap(), update);
    }

    #[tokio::test]
    async fn test_block_body_must_be_for_requested_slot() {
        let server = MockServer::start_async().await;
        let body = sample_body();
        let at_slot = api_block_json(6500, &body);
        let off_slot = api_block_json(6499, &body);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/eth/v2/beacon/blocks/6500");
                then.status(200).json_body(at_slot);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/eth/v2/beacon/blocks/6501");
                then.status(200).json_body(off_slot);
            })
            .await;

        let feed = feed(&server);
        let fetched = feed.fetch_block_body(6500).await.unwrap();
        assert_eq!(fetched.root(), body.root());
        assert!(matches!(
            feed.fetch_block_body(6501).await,
            Err(ProverError::Decode { what: "beacon block", reason }) if reason.contains("got 6499")
        ));
    }
}

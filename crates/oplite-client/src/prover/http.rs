//! Client for a remote prover server.
//!
//! The server exposes the SSZ-encoded contents of a trusted client's store:
//! - `GET /sync-committee/{period|latest}`: concatenated committee keys
//! - `GET /sync-committee/hashes?startPeriod=&maxCount=`: concatenated hashes
//! - `GET /sync-update/{period}`: one altair `LightClientUpdate`

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use oplite_core::codec::{decode_committee, decode_hashes, decode_update};
use oplite_core::{BlsPublicKey, LightClientUpdate, Root, SyncPeriod};
use parking_lot::Mutex;
use tracing::debug;

use super::{batch_count, PeriodRequest, Prover};
use crate::error::ProverError;
use crate::network::{join_url, HttpTransport, NetworkError};

pub struct HttpProver {
    server_url: String,
    transport: HttpTransport,
    committee_size: usize,
    /// Raw responses by request path. `latest` is never cached.
    cache: Mutex<HashMap<String, Vec<u8>>>,
    cached_hashes: Mutex<HashMap<SyncPeriod, Root>>,
}

impl HttpProver {
    pub fn new(
        server_url: impl Into<String>,
        committee_size: usize,
        timeout: Duration,
    ) -> Result<Self, NetworkError> {
        Ok(Self {
            server_url: server_url.into(),
            transport: HttpTransport::new(timeout)?,
            committee_size,
            cache: Mutex::new(HashMap::new()),
            cached_hashes: Mutex::new(HashMap::new()),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    async fn fetch(&self, path: &str, cacheable: bool) -> Result<Vec<u8>, ProverError> {
        let cached = self.cache.lock().get(path).cloned();
        if let Some(bytes) = cached {
            return Ok(bytes);
        }

        let bytes = self
            .transport
            .fetch_bytes(&join_url(&self.server_url, path))
            .await?;
        if cacheable {
            self.cache.lock().insert(path.to_string(), bytes.clone());
        }
        Ok(bytes)
    }
}

#[async_trait]
impl Prover for HttpProver {
    async fn get_committee(&self, period: PeriodRequest) -> Result<Vec<BlsPublicKey>, ProverError> {
        let cacheable = matches!(period, PeriodRequest::Period(_));
        let bytes = self
            .fetch(&format!("/sync-committee/{period}"), cacheable)
            .await?;
        Ok(decode_committee(&bytes, self.committee_size)?)
    }

    async fn get_sync_update(
        &self,
        period: SyncPeriod,
        _current_period: SyncPeriod,
        _batch_size: usize,
    ) -> Result<LightClientUpdate, ProverError> {
        let bytes = self.fetch(&format!("/sync-update/{period}"), true).await?;
        Ok(decode_update(&bytes, self.committee_size)?)
    }

    async fn get_committee_hash(
        &self,
        period: SyncPeriod,
        current_period: SyncPeriod,
        cache_count: usize,
    ) -> Result<Option<Root>, ProverError> {
        let cached = self.cached_hashes.lock().get(&period).copied();
        if cached.is_some() {
            return Ok(cached);
        }

        let count = batch_count(period, current_period, cache_count);
        let bytes = self
            .fetch(
                &format!("/sync-committee/hashes?startPeriod={period}&maxCount={count}"),
                true,
            )
            .await?;
        let hashes = decode_hashes(&bytes)?;
        debug!(server = %self.server_url, period, received = hashes.len(), "Fetched committee hashes");

        let mut cached_hashes = self.cached_hashes.lock();
        for (offset, hash) in (0u64..).zip(hashes) {
            cached_hashes.insert(period + offset, hash);
        }
        Ok(cached_hashes.get(&period).copied())
    }
}

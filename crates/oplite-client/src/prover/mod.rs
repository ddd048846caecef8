//! Untrusted sources of committees and committee transitions.
//!
//! Nothing a prover returns is trusted. Committee hashes are only claims; the
//! sync strategies settle them by verifying signed updates in `oplite-core`.

use std::fmt;

use async_trait::async_trait;
use oplite_core::{BlsPublicKey, LightClientUpdate, Root, SyncPeriod};

use crate::error::ProverError;

pub mod beacon_api;
pub mod http;
pub mod store;

pub use beacon_api::BeaconApiProver;
pub use http::HttpProver;
pub use store::StoreProver;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PeriodRequest {
    Period(SyncPeriod),
    Latest,
}

impl fmt::Display for PeriodRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Period(period) => write!(f, "{period}"),
            Self::Latest => f.write_str("latest"),
        }
    }
}

impl From<SyncPeriod> for PeriodRequest {
    fn from(period: SyncPeriod) -> Self {
        Self::Period(period)
    }
}

#[async_trait]
pub trait Prover: Send + Sync {
    /// The committee the prover claims for `period`.
    async fn get_committee(&self, period: PeriodRequest) -> Result<Vec<BlsPublicKey>, ProverError>;

    /// The update for `period`, whose next committee is the committee of
    /// `period + 1`. Implementations may prefetch up to `batch_size`
    /// following periods, bounded by `current_period`.
    async fn get_sync_update(
        &self,
        period: SyncPeriod,
        current_period: SyncPeriod,
        batch_size: usize,
    ) -> Result<LightClientUpdate, ProverError>;

    /// Hash of the committee the prover claims for `period`, `None` when it
    /// has none. Implementations may prefetch up to `cache_count` periods.
    async fn get_committee_hash(
        &self,
        period: SyncPeriod,
        current_period: SyncPeriod,
        cache_count: usize,
    ) -> Result<Option<Root>, ProverError>;
}

/// How many periods starting at `period` to request in one batch.
pub(crate) fn batch_count(period: SyncPeriod, last_period: SyncPeriod, max: usize) -> usize {
    let remaining = last_period.saturating_sub(period).saturating_add(1);
    usize::try_from(remaining).unwrap_or(usize::MAX).min(max).max(1)
}

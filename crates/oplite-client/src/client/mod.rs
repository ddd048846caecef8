//! The light client: the trusted committee, how it advances, and how the
//! chain head is followed with it.
//!
//! A client starts from the genesis committee of its config and only ever
//! moves forward. `sync` hands the walk from the last trusted committee to the
//! current period to a [`SyncStrategy`]; the committee it returns replaces the
//! trusted one together with its period, never one without the other.

use std::sync::Arc;

use alloy_primitives::B256;
use async_trait::async_trait;
use oplite_core::{
    current_period, period_at_slot, verify_optimistic_update, BlsPublicKey, ChainConfig,
    ExecutionInfo, SyncPeriod,
};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{ClientConfig, RetryConfig};
use crate::error::ClientError;
use crate::feed::BeaconFeed;
use crate::prover::Prover;
use crate::store::Store;

mod sequential;
mod tournament;

pub use sequential::SequentialSync;
pub use tournament::TournamentSync;

/// Where a sync walk starts and where it has to end.
#[derive(Clone, Copy, Debug)]
pub struct SyncContext<'a> {
    pub chain: &'a ChainConfig,
    pub batch_size: usize,
    /// Period of `trusted_committee`.
    pub trusted_period: SyncPeriod,
    pub trusted_committee: &'a [BlsPublicKey],
    pub current_period: SyncPeriod,
}

/// The prover a strategy settled on and the committee it proved for the
/// current period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProverInfo {
    pub index: usize,
    pub sync_committee: Vec<BlsPublicKey>,
}

#[async_trait]
pub trait SyncStrategy: Send + Sync {
    /// Walk from `ctx.trusted_committee` to the committee of
    /// `ctx.current_period`. Fails with `NoHonestSource` when no prover gets
    /// there.
    async fn sync_to(&self, ctx: &SyncContext<'_>) -> Result<ProverInfo, ClientError>;
}

struct SyncState {
    period: SyncPeriod,
    committee: Arc<[BlsPublicKey]>,
    prover: usize,
}

pub struct Client<S, F, C = SystemClock> {
    config: ClientConfig,
    genesis_period: SyncPeriod,
    strategy: S,
    feed: F,
    clock: C,
    state: RwLock<Option<SyncState>>,
    sync_lock: tokio::sync::Mutex<()>,
    latest_block_hash: Mutex<Option<B256>>,
}

impl<F: BeaconFeed> Client<SequentialSync, F> {
    /// Client that trusts `provers` in order, optionally recording every
    /// verified update into `store`.
    pub fn sequential(
        config: ClientConfig,
        provers: Vec<Arc<dyn Prover>>,
        store: Option<Arc<dyn Store>>,
        feed: F,
    ) -> Result<Self, ClientError> {
        let mut strategy = SequentialSync::new(provers);
        if let Some(store) = store {
            strategy = strategy.with_store(store);
        }
        Self::new(config, strategy, feed)
    }
}

impl<F: BeaconFeed> Client<TournamentSync, F> {
    /// Client that settles disagreements between `provers` by signature.
    pub fn tournament(
        config: ClientConfig,
        provers: Vec<Arc<dyn Prover>>,
        feed: F,
    ) -> Result<Self, ClientError> {
        Self::new(config, TournamentSync::new(provers), feed)
    }
}

impl<S: SyncStrategy, F: BeaconFeed> Client<S, F> {
    pub fn new(config: ClientConfig, strategy: S, feed: F) -> Result<Self, ClientError> {
        Self::with_clock(config, strategy, feed, SystemClock)
    }
}

impl<S: SyncStrategy, F: BeaconFeed, C: Clock> Client<S, F, C> {
    pub fn with_clock(
        config: ClientConfig,
        strategy: S,
        feed: F,
        clock: C,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        let genesis_period = period_at_slot(&config.chain, config.genesis.slot)?;
        Ok(Self {
            config,
            genesis_period,
            strategy,
            feed,
            clock,
            state: RwLock::new(None),
            sync_lock: tokio::sync::Mutex::new(()),
            latest_block_hash: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn genesis_period(&self) -> SyncPeriod {
        self.genesis_period
    }

    pub fn current_period(&self) -> Result<SyncPeriod, ClientError> {
        Ok(current_period(
            &self.config.chain,
            self.config.genesis_time(),
            self.clock.now(),
        )?)
    }

    /// Period of the trusted committee, `None` before the first sync.
    pub fn latest_period(&self) -> Option<SyncPeriod> {
        self.state.read().as_ref().map(|s| s.period)
    }

    pub fn latest_committee(&self) -> Option<Arc<[BlsPublicKey]>> {
        self.state.read().as_ref().map(|s| s.committee.clone())
    }

    /// Index of the prover the last sync settled on.
    pub fn latest_prover(&self) -> Option<usize> {
        self.state.read().as_ref().map(|s| s.prover)
    }

    pub fn is_synced(&self) -> bool {
        match (self.latest_period(), self.current_period()) {
            (Some(latest), Ok(current)) => latest == current,
            _ => false,
        }
    }

    /// Bring the trusted committee up to the current period. A no-op when it
    /// already is.
    pub async fn sync(&self) -> Result<(), ClientError> {
        let current = self.current_period()?;
        if current < self.genesis_period {
            return Err(ClientError::BeforeGenesis {
                current,
                genesis: self.genesis_period,
            });
        }
        if self.latest_period().is_some_and(|latest| current <= latest) {
            return Ok(());
        }

        let _guard = self.sync_lock.lock().await;
        let (trusted_period, trusted_committee) = match self.state.read().as_ref() {
            Some(state) if current <= state.period => return Ok(()),
            Some(state) => (state.period, state.committee.clone()),
            None => (
                self.genesis_period,
                Arc::from(self.config.genesis.committee.clone()),
            ),
        };

        info!(from = trusted_period, to = current, "Syncing committee");
        let ctx = SyncContext {
            chain: &self.config.chain,
            batch_size: self.config.batch_size,
            trusted_period,
            trusted_committee: &trusted_committee,
            current_period: current,
        };
        let winner = self.strategy.sync_to(&ctx).await?;

        *self.state.write() = Some(SyncState {
            period: current,
            committee: Arc::from(winner.sync_committee),
            prover: winner.index,
        });
        info!(period = current, prover = winner.index, "Committee synced");
        Ok(())
    }

    /// Execution block of the newest head signed by the trusted committee.
    pub async fn get_latest_execution(&self) -> Result<ExecutionInfo, ClientError> {
        let committee = self.latest_committee().ok_or(ClientError::NotSynced)?;

        let update = self.feed.fetch_optimistic_update().await?;
        verify_optimistic_update(&self.config.chain, &committee, &update)?;
        let header = &update.attested_header;
        debug!(slot = header.slot, "Optimistic update verified");

        let body = self.feed.fetch_block_body(header.slot).await?;
        let computed = body.root();
        if computed != header.body_root.0 {
            return Err(ClientError::BodyRootMismatch {
                slot: header.slot,
                expected: B256::from(header.body_root.0),
                computed: B256::from(computed),
            });
        }
        Ok(body.execution_payload.execution_info())
    }

    /// Sync and fetch the latest execution, retrying with a doubling delay
    /// while the failure is transient.
    pub async fn get_next_valid_execution_info(&self) -> Result<ExecutionInfo, ClientError> {
        let RetryConfig {
            base_delay,
            max_delay,
        } = self.config.retry;
        let mut delay = base_delay;
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.sync_and_fetch().await {
                Ok(info) => return Ok(info),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => warn!(attempt = attempts, error = %e, "No valid execution yet"),
            }
            if delay > max_delay {
                return Err(ClientError::NoValidExecution { attempts });
            }
            tokio::time::sleep(delay).await;
            delay = delay.saturating_mul(2);
        }
    }

    /// Poll forever, calling `callback` once per new execution block. Errors
    /// are logged and retried on the next tick. Dropping the future stops it.
    pub async fn subscribe<Cb>(&self, mut callback: Cb)
    where
        Cb: FnMut(ExecutionInfo) + Send,
    {
        loop {
            tokio::time::sleep(self.config.polling_delay).await;
            match self.poll_once().await {
                Ok(Some(info)) => callback(info),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Polling iteration failed"),
            }
        }
    }

    /// Run [`Client::subscribe`] on a tokio task until the returned handle is
    /// dropped.
    pub fn into_subscription<Cb>(self: Arc<Self>, callback: Cb) -> Subscription
    where
        S: 'static,
        F: 'static,
        C: 'static,
        Cb: FnMut(ExecutionInfo) + Send + 'static,
    {
        let handle = tokio::spawn(async move { self.subscribe(callback).await });
        Subscription { handle }
    }

    async fn sync_and_fetch(&self) -> Result<ExecutionInfo, ClientError> {
        self.sync().await?;
        self.get_latest_execution().await
    }

    async fn poll_once(&self) -> Result<Option<ExecutionInfo>, ClientError> {
        let info = self.sync_and_fetch().await?;
        let mut last = self.latest_block_hash.lock();
        if *last == Some(info.block_hash) {
            return Ok(None);
        }
        *last = Some(info.block_hash);
        info!(
            block_number = info.block_number,
            block_hash = %info.block_hash,
            "New verified execution"
        );
        Ok(Some(info))
    }
}

/// A running polling loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use oplite_core::{verify_committee_transition, BlsPublicKey, SyncPeriod};
use tracing::{debug, info, warn};

use super::{ProverInfo, SyncContext, SyncStrategy};
use crate::error::ClientError;
use crate::prover::Prover;
use crate::store::Store;

/// Walks the committee chain with one prover at a time, in the order given.
///
/// A prover that errors or serves an update that fails verification is
/// abandoned, and the next one continues from the last verified committee.
/// An earlier prover is trusted to be tried first, so this does not tolerate a
/// dishonest prover that is never caught lying.
pub struct SequentialSync {
    provers: Vec<Arc<dyn Prover>>,
    store: Option<Arc<dyn Store>>,
}

impl SequentialSync {
    pub fn new(provers: Vec<Arc<dyn Prover>>) -> Self {
        Self {
            provers,
            store: None,
        }
    }

    /// Record every verified update into `store`.
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Advance `period` and `committee` as far as `prover` can prove.
    async fn walk(
        &self,
        prover: &dyn Prover,
        ctx: &SyncContext<'_>,
        period: &mut SyncPeriod,
        committee: &mut Vec<BlsPublicKey>,
    ) -> Result<(), ClientError> {
        while *period < ctx.current_period {
            let update = prover
                .get_sync_update(*period, ctx.current_period, ctx.batch_size)
                .await?;
            let next = verify_committee_transition(ctx.chain, committee, *period, &update)?;

            if let Some(store) = &self.store {
                if let Err(e) = store.add_update(*period, &update) {
                    warn!(period = *period, error = %e, "Failed to store verified update");
                }
            }
            debug!(period = *period, "Committee transition verified");
            *committee = next;
            *period += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl SyncStrategy for SequentialSync {
    async fn sync_to(&self, ctx: &SyncContext<'_>) -> Result<ProverInfo, ClientError> {
        let mut period = ctx.trusted_period;
        let mut committee = ctx.trusted_committee.to_vec();

        for (index, prover) in self.provers.iter().enumerate() {
            match self.walk(prover.as_ref(), ctx, &mut period, &mut committee).await {
                Ok(()) => {
                    info!(prover = index, period, "Prover reached the current period");
                    return Ok(ProverInfo {
                        index,
                        sync_committee: committee,
                    });
                }
                Err(e) => warn!(prover = index, period, error = %e, "Abandoning prover"),
            }
        }
        Err(ClientError::NoHonestSource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_utils::*;
    use oplite_core::testing::TestCommittee;
    use oplite_core::ChainConfig;

    fn context<'a>(
        chain: &'a ChainConfig,
        genesis: &'a TestCommittee,
        from: SyncPeriod,
        to: SyncPeriod,
    ) -> SyncContext<'a> {
        SyncContext {
            chain,
            batch_size: 4,
            trusted_period: from,
            trusted_committee: &genesis.pubkeys,
            current_period: to,
        }
    }

    #[tokio::test]
    async fn test_honest_prover_first() {
        init_tracing();
        let chain = ChainConfig::minimal();
        let genesis = TestCommittee::generate(100, COMMITTEE_SIZE);
        let honest = Arc::new(ScriptedProver::honest(&chain, 100, 104));
        let liar = Arc::new(ScriptedProver::forked(&chain, 100, 104, 101, 1));
        let strategy = SequentialSync::new(vec![honest.clone(), liar.clone()]);

        let winner = strategy.sync_to(&context(&chain, &genesis, 100, 103)).await.unwrap();
        assert_eq!(winner.index, 0);
        assert_eq!(winner.sync_committee, TestCommittee::generate(103, COMMITTEE_SIZE).pubkeys);
        assert!(liar.requested_updates().is_empty());
    }

    #[tokio::test]
    async fn test_dishonest_prover_first_hands_over_progress() {
        init_tracing();
        let chain = ChainConfig::minimal();
        let genesis = TestCommittee::generate(100, COMMITTEE_SIZE);
        let liar = Arc::new(ScriptedProver::forked(&chain, 100, 104, 102, 1));
        let honest = Arc::new(ScriptedProver::honest(&chain, 100, 104));
        let strategy = SequentialSync::new(vec![liar.clone(), honest.clone()]);

        let winner = strategy.sync_to(&context(&chain, &genesis, 100, 103)).await.unwrap();
        assert_eq!(winner.index, 1);
        assert_eq!(winner.sync_committee, TestCommittee::generate(103, COMMITTEE_SIZE).pubkeys);
        assert_eq!(liar.requested_updates(), vec![100, 101]);
        assert_eq!(honest.requested_updates(), vec![101, 102]);
    }

    #[tokio::test]
    async fn test_offline_prover_is_skipped() {
        let chain = ChainConfig::minimal();
        let genesis = TestCommittee::generate(100, COMMITTEE_SIZE);
        let offline = Arc::new(ScriptedProver::honest(&chain, 100, 104));
        offline.set_offline(true);
        let honest = Arc::new(ScriptedProver::honest(&chain, 100, 104));
        let strategy = SequentialSync::new(vec![offline, honest]);

        let winner = strategy.sync_to(&context(&chain, &genesis, 100, 102)).await.unwrap();
        assert_eq!(winner.index, 1);
    }

    #[tokio::test]
    async fn test_only_dishonest_provers() {
        init_tracing();
        let chain = ChainConfig::minimal();
        let genesis = TestCommittee::generate(100, COMMITTEE_SIZE);
        let strategy = SequentialSync::new(vec![
            Arc::new(ScriptedProver::forked(&chain, 100, 104, 101, 1)),
            Arc::new(ScriptedProver::forked(&chain, 100, 104, 102, 2)),
        ]);

        assert!(matches!(
            strategy.sync_to(&context(&chain, &genesis, 100, 103)).await,
            Err(ClientError::NoHonestSource)
        ));
    }

    #[tokio::test]
    async fn test_no_provers() {
        let chain = ChainConfig::minimal();
        let genesis = TestCommittee::generate(100, COMMITTEE_SIZE);
        let strategy = SequentialSync::new(vec![]);
        assert!(matches!(
            strategy.sync_to(&context(&chain, &genesis, 100, 101)).await,
            Err(ClientError::NoHonestSource)
        ));
    }

    #[tokio::test]
    async fn test_verified_updates_are_stored() {
        let chain = ChainConfig::minimal();
        let genesis = TestCommittee::generate(100, COMMITTEE_SIZE);
        let store = Arc::new(MemoryStore::new());
        let strategy = SequentialSync::new(vec![
            Arc::new(ScriptedProver::forked(&chain, 100, 104, 102, 1)),
            Arc::new(ScriptedProver::honest(&chain, 100, 104)),
        ])
        .with_store(store.clone());

        strategy.sync_to(&context(&chain, &genesis, 100, 103)).await.unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.latest_period(), Some(103));
    }
}

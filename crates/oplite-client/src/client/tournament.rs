use std::sync::Arc;

use alloy_primitives::B256;
use async_trait::async_trait;
use futures::future::join_all;
use futures::join;
use oplite_core::{
    committee_hash, verify_committee_transition, BlsPublicKey, Root, SyncPeriod,
    VerificationError,
};
use tracing::{debug, info, warn};

use super::{ProverInfo, SyncContext, SyncStrategy};
use crate::error::ClientError;
use crate::prover::Prover;

/// Syncs against any number of provers of which at least one is honest,
/// without knowing which.
///
/// Each period every remaining prover claims a committee hash. Agreement is
/// taken as is; any disagreement is settled by making the two sides prove
/// their claim with a signed committee transition from the last trusted
/// committee. The number of provers behind a claim carries no weight.
pub struct TournamentSync {
    provers: Vec<Arc<dyn Prover>>,
}

/// A prover and the committee hash it claims for the period being played.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Claim {
    index: usize,
    hash: Root,
}

impl TournamentSync {
    pub fn new(provers: Vec<Arc<dyn Prover>>) -> Self {
        Self { provers }
    }

    /// Claims of `contenders` for `period`. A prover that errors or has no
    /// claim drops out.
    async fn claims(
        &self,
        contenders: &[usize],
        period: SyncPeriod,
        ctx: &SyncContext<'_>,
    ) -> Vec<Claim> {
        let answers = join_all(contenders.iter().map(|&index| async move {
            let answer = self.provers[index]
                .get_committee_hash(period, ctx.current_period, ctx.batch_size)
                .await;
            (index, answer)
        }))
        .await;

        answers
            .into_iter()
            .filter_map(|(index, answer)| match answer {
                Ok(Some(hash)) => Some(Claim { index, hash }),
                Ok(None) => {
                    debug!(prover = index, period, "Prover has no committee for period");
                    None
                }
                Err(e) => {
                    warn!(prover = index, period, error = %e, "Prover failed to claim a committee");
                    None
                }
            })
            .collect()
    }

    /// The hash every one of `contenders` claims for `period`, if they all
    /// answer and agree.
    async fn unanimous_hash(
        &self,
        contenders: &[usize],
        period: SyncPeriod,
        ctx: &SyncContext<'_>,
    ) -> Option<Root> {
        let claims = self.claims(contenders, period, ctx).await;
        let first = claims.first()?;
        let unanimous =
            claims.len() == contenders.len() && claims.iter().all(|c| c.hash == first.hash);
        unanimous.then_some(first.hash)
    }

    /// The committee of `period - 1`, from the trusted state or from one of
    /// `sources`, accepted only if it hashes to `prev_hash`.
    async fn previous_committee(
        &self,
        sources: &[usize],
        period: SyncPeriod,
        prev_hash: Root,
        ctx: &SyncContext<'_>,
    ) -> Option<Vec<BlsPublicKey>> {
        let prev = period - 1;
        if prev == ctx.trusted_period {
            return Some(ctx.trusted_committee.to_vec());
        }
        for &index in sources {
            match self.provers[index].get_committee(prev.into()).await {
                Ok(committee) if committee_hash(&committee) == prev_hash => return Some(committee),
                Ok(_) => warn!(prover = index, period = prev, "Served committee does not match the trusted hash"),
                Err(e) => warn!(prover = index, period = prev, error = %e, "Failed to fetch previous committee"),
            }
        }
        None
    }

    /// Whether `claim`'s prover can prove its hash: its update for
    /// `period - 1` must verify against `prev_committee` and yield a
    /// committee with the claimed hash.
    async fn check_committee_hash_at(
        &self,
        claim: &Claim,
        period: SyncPeriod,
        prev_committee: &[BlsPublicKey],
        ctx: &SyncContext<'_>,
    ) -> bool {
        let prev = period - 1;
        let update = match self.provers[claim.index]
            .get_sync_update(prev, ctx.current_period, ctx.batch_size)
            .await
        {
            Ok(update) => update,
            Err(e) => {
                debug!(prover = claim.index, period = prev, error = %e, "Prover could not serve update");
                return false;
            }
        };
        match verify_committee_transition(ctx.chain, prev_committee, prev, &update) {
            Ok(next) => committee_hash(&next) == claim.hash,
            Err(e) => {
                debug!(prover = claim.index, period = prev, reason = e.reason(), "Committee transition rejected");
                false
            }
        }
    }

    /// Honesty verdicts of `a` and `b` for their conflicting claims at
    /// `period`. Both are judged against the same previous committee, so
    /// swapping them swaps the verdicts.
    async fn fight(
        &self,
        a: &Claim,
        b: &Claim,
        period: SyncPeriod,
        prev_hash: Root,
        ctx: &SyncContext<'_>,
    ) -> (bool, bool) {
        let Some(prev_committee) =
            self.previous_committee(&[a.index, b.index], period, prev_hash, ctx).await
        else {
            warn!(period, "Neither prover could serve the trusted previous committee");
            return (false, false);
        };
        let verdicts = join!(
            self.check_committee_hash_at(a, period, &prev_committee, ctx),
            self.check_committee_hash_at(b, period, &prev_committee, ctx),
        );
        debug!(period, a = a.index, b = b.index, verdicts = ?verdicts, "Fight settled");
        verdicts
    }

    /// Whether `claim` holds up on its own, against the previous committee
    /// its prover serves.
    async fn proves_claim(
        &self,
        claim: &Claim,
        period: SyncPeriod,
        prev_hash: Root,
        ctx: &SyncContext<'_>,
    ) -> bool {
        match self.previous_committee(&[claim.index], period, prev_hash, ctx).await {
            Some(prev_committee) => {
                self.check_committee_hash_at(claim, period, &prev_committee, ctx).await
            }
            None => false,
        }
    }

    /// Play `claims` left to right. Equal claims join the winners; a
    /// differing claim fights the first winner. Once a fight has been played,
    /// a claim entering an empty winner set must prove itself first.
    async fn tournament(
        &self,
        claims: Vec<Claim>,
        period: SyncPeriod,
        prev_hash: Root,
        ctx: &SyncContext<'_>,
    ) -> Vec<Claim> {
        let mut winners: Vec<Claim> = Vec::new();
        let mut contested = false;
        for challenger in claims {
            let Some(champion) = winners.first().copied() else {
                if contested && !self.proves_claim(&challenger, period, prev_hash, ctx).await {
                    warn!(period, prover = challenger.index, "Unproven claim after both fighters lost");
                    continue;
                }
                winners.push(challenger);
                continue;
            };
            if champion.hash == challenger.hash {
                winners.push(challenger);
                continue;
            }
            contested = true;
            match self.fight(&champion, &challenger, period, prev_hash, ctx).await {
                (true, false) => {
                    info!(period, winner = champion.index, loser = challenger.index, "Challenger lost")
                }
                (false, true) => {
                    info!(period, winner = challenger.index, "Challenger replaced the winners");
                    winners = vec![challenger];
                }
                (false, false) => {
                    warn!(period, a = champion.index, b = challenger.index, "Both provers failed to prove their claim");
                    winners.clear();
                }
                (true, true) => {
                    warn!(period, a = champion.index, b = challenger.index, "Conflicting claims both proved, keeping winners")
                }
            }
        }
        winners
    }

    /// Committee of `period` from prover `index`, checked against `expected`.
    async fn get_committee(
        &self,
        index: usize,
        period: SyncPeriod,
        expected: Root,
        ctx: &SyncContext<'_>,
    ) -> Result<Vec<BlsPublicKey>, ClientError> {
        if period == ctx.trusted_period {
            return Ok(ctx.trusted_committee.to_vec());
        }
        let committee = self.provers[index].get_committee(period.into()).await?;
        if committee.len() != ctx.chain.sync_committee_size {
            return Err(VerificationError::InvalidCommitteeSize {
                expected: ctx.chain.sync_committee_size,
                got: committee.len(),
            }
            .into());
        }
        if committee_hash(&committee) != expected {
            return Err(ClientError::CommitteeMismatch {
                prover: index,
                period,
                expected: B256::from(expected),
            });
        }
        Ok(committee)
    }

    /// The first of `contenders` that serves the committee of the current
    /// period matching `expected`.
    async fn resolve(
        &self,
        contenders: &[usize],
        expected: Root,
        ctx: &SyncContext<'_>,
    ) -> Result<ProverInfo, ClientError> {
        for &index in contenders {
            match self.get_committee(index, ctx.current_period, expected, ctx).await {
                Ok(sync_committee) => {
                    return Ok(ProverInfo {
                        index,
                        sync_committee,
                    })
                }
                Err(e) => warn!(prover = index, error = %e, "Could not resolve committee"),
            }
        }
        Err(ClientError::NoHonestSource)
    }
}

#[async_trait]
impl SyncStrategy for TournamentSync {
    async fn sync_to(&self, ctx: &SyncContext<'_>) -> Result<ProverInfo, ClientError> {
        let current = ctx.current_period;
        let mut contenders: Vec<usize> = (0..self.provers.len()).collect();
        let mut last_hash = committee_hash(ctx.trusted_committee);

        for period in ctx.trusted_period + 1..=current {
            let claims = self.claims(&contenders, period, ctx).await;
            let Some(first) = claims.first().copied() else {
                warn!(period, "No prover claimed a committee");
                return Err(ClientError::NoHonestSource);
            };

            if claims.iter().all(|c| c.hash == first.hash) {
                contenders = claims.iter().map(|c| c.index).collect();
                if period == current {
                    last_hash = first.hash;
                    break;
                }
                if let Some(hash) = self.unanimous_hash(&contenders, current, ctx).await {
                    debug!(period, "Provers agree through the current period");
                    last_hash = hash;
                    break;
                }
                last_hash = first.hash;
                continue;
            }

            let winners = self.tournament(claims, period, last_hash, ctx).await;
            match winners.as_slice() {
                [] => return Err(ClientError::NoHonestSource),
                [winner] => {
                    contenders = vec![winner.index];
                    last_hash = if period == current {
                        winner.hash
                    } else {
                        match self.provers[winner.index]
                            .get_committee_hash(current, current, ctx.batch_size)
                            .await
                        {
                            Ok(Some(hash)) => hash,
                            Ok(None) => return Err(ClientError::NoHonestSource),
                            Err(e) => {
                                warn!(prover = winner.index, error = %e, "Winner failed to claim the current committee");
                                return Err(ClientError::NoHonestSource);
                            }
                        }
                    };
                    break;
                }
                [first, ..] => {
                    last_hash = first.hash;
                    contenders = winners.iter().map(|w| w.index).collect();
                }
            }
        }

        self.resolve(&contenders, last_hash, ctx).await
    }
}

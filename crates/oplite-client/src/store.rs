//! Committee and update storage backing a prover server.
//!
//! Entries are keyed by the period of the update. The committee of period
//! `P` is the next committee of the update stored at `P - 1`.

use std::collections::BTreeMap;

use oplite_core::codec::{encode_committee, encode_hashes, encode_update};
use oplite_core::{committee_hash, LightClientUpdate, Root, SyncPeriod};
use parking_lot::RwLock;

use crate::error::StoreError;

/// Serialized committee data keyed by period. All values are SSZ bytes as
/// served over the prover HTTP API.
pub trait Store: Send + Sync {
    fn add_update(&self, period: SyncPeriod, update: &LightClientUpdate) -> Result<(), StoreError>;

    /// Concatenated hashes of the committees of `start_period` onwards, at
    /// most `count` of them, stopping at the first gap.
    fn get_committee_hashes(&self, start_period: SyncPeriod, count: usize) -> Result<Vec<u8>, StoreError>;

    fn get_committee(&self, period: SyncPeriod) -> Result<Vec<u8>, StoreError>;

    fn get_update(&self, period: SyncPeriod) -> Result<Vec<u8>, StoreError>;

    /// Newest period with a known committee.
    fn latest_period(&self) -> Option<SyncPeriod>;
}

struct StoredPeriod {
    update: Vec<u8>,
    next_committee: Vec<u8>,
    next_committee_hash: Root,
}

#[derive(Default)]
pub struct MemoryStore {
    periods: RwLock<BTreeMap<SyncPeriod, StoredPeriod>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.periods.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.read().is_empty()
    }
}

impl Store for MemoryStore {
    fn add_update(&self, period: SyncPeriod, update: &LightClientUpdate) -> Result<(), StoreError> {
        let pubkeys = &update.next_sync_committee.pubkeys;
        let stored = StoredPeriod {
            update: encode_update(update),
            next_committee: encode_committee(pubkeys),
            next_committee_hash: committee_hash(pubkeys),
        };
        self.periods.write().insert(period, stored);
        Ok(())
    }

    fn get_committee_hashes(&self, start_period: SyncPeriod, count: usize) -> Result<Vec<u8>, StoreError> {
        let periods = self.periods.read();
        let hashes: Vec<Root> = (start_period..)
            .take(count)
            .map_while(|period| {
                let prev = period.checked_sub(1)?;
                periods.get(&prev).map(|p| p.next_committee_hash)
            })
            .collect();
        if hashes.is_empty() {
            return Err(StoreError::Missing {
                what: "committee hash",
                period: start_period,
            });
        }
        Ok(encode_hashes(&hashes))
    }

    fn get_committee(&self, period: SyncPeriod) -> Result<Vec<u8>, StoreError> {
        let missing = StoreError::Missing {
            what: "committee",
            period,
        };
        let prev = period.checked_sub(1).ok_or(missing.clone())?;
        self.periods
            .read()
            .get(&prev)
            .map(|p| p.next_committee.clone())
            .ok_or(missing)
    }

    fn get_update(&self, period: SyncPeriod) -> Result<Vec<u8>, StoreError> {
        self.periods
            .read()
            .get(&period)
            .map(|p| p.update.clone())
            .ok_or(StoreError::Missing {
                what: "update",
                period,
            })
    }

    fn latest_period(&self) -> Option<SyncPeriod> {
        self.periods.read().keys().next_back().map(|period| period + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oplite_core::codec::{decode_committee, decode_hashes, decode_update};
    use oplite_core::testing::{build_update, TestCommittee};
    use oplite_core::ChainConfig;

    #[test]
    fn test_committee_of_period_comes_from_previous_update() {
        let config = ChainConfig::minimal();
        let c10 = TestCommittee::generate(10, 32);
        let c11 = TestCommittee::generate(11, 32);
        let c12 = TestCommittee::generate(12, 32);
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.latest_period(), None);

        let u10 = build_update(&config, &c10, 10, &c11.committee(), 32);
        let u11 = build_update(&config, &c11, 11, &c12.committee(), 32);
        store.add_update(10, &u10).unwrap();
        store.add_update(11, &u11).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.latest_period(), Some(12));

        assert_eq!(decode_committee(&store.get_committee(11).unwrap(), 32).unwrap(), c11.pubkeys);
        assert_eq!(decode_committee(&store.get_committee(12).unwrap(), 32).unwrap(), c12.pubkeys);
        assert_eq!(decode_update(&store.get_update(11).unwrap(), 32).unwrap(), u11);
        assert_eq!(
            store.get_committee(10),
            Err(StoreError::Missing {
                what: "committee",
                period: 10
            })
        );
    }

    #[test]
    fn test_committee_hashes_stop_at_gap() {
        let config = ChainConfig::minimal();
        let c10 = TestCommittee::generate(10, 32);
        let c11 = TestCommittee::generate(11, 32);
        let c12 = TestCommittee::generate(12, 32);
        let store = MemoryStore::new();
        store.add_update(10, &build_update(&config, &c10, 10, &c11.committee(), 32)).unwrap();
        store.add_update(11, &build_update(&config, &c11, 11, &c12.committee(), 32)).unwrap();

        let hashes = decode_hashes(&store.get_committee_hashes(11, 10).unwrap()).unwrap();
        assert_eq!(hashes, vec![c11.hash(), c12.hash()]);

        let hashes = decode_hashes(&store.get_committee_hashes(12, 1).unwrap()).unwrap();
        assert_eq!(hashes, vec![c12.hash()]);

        assert!(store.get_committee_hashes(13, 4).is_err());
        assert!(store.get_committee_hashes(0, 4).is_err());
    }
}

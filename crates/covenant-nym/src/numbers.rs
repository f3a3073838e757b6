//! Locked, per-notary number sets.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{Mutex, MutexGuard},
};

use covenant_contracts::{identity::NotaryId, number::TransactionNumber};
use covenant_core::traits::NumberSet;

/// A `NumberSet` kept in memory. Ordered so `take_lowest` is cheap.
#[derive(Debug, Default)]
pub struct NumberStore {
    sets: Mutex<HashMap<NotaryId, BTreeSet<i64>>>,
}

impl NumberStore {
    fn sets(&self) -> MutexGuard<'_, HashMap<NotaryId, BTreeSet<i64>>> {
        self.sets.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Numbers held for `notary`, ascending.
    pub fn snapshot(&self, notary: &NotaryId) -> Vec<i64> {
        self.sets()
            .get(notary)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Replace everything held for `notary`.
    pub fn replace(&self, notary: &NotaryId, numbers: impl IntoIterator<Item = i64>) {
        self.sets().insert(notary.clone(), numbers.into_iter().collect());
    }
}

impl NumberSet for NumberStore {
    fn contains(&self, notary: &NotaryId, number: TransactionNumber) -> bool {
        self.sets()
            .get(notary)
            .is_some_and(|s| s.contains(&number.value()))
    }

    fn add(&self, notary: &NotaryId, number: TransactionNumber) -> bool {
        self.sets().entry(notary.clone()).or_default().insert(number.value())
    }

    fn remove(&self, notary: &NotaryId, number: TransactionNumber) -> bool {
        self.sets()
            .get_mut(notary)
            .is_some_and(|s| s.remove(&number.value()))
    }

    fn take_lowest(&self, notary: &NotaryId) -> Option<TransactionNumber> {
        self.sets().get_mut(notary)?.pop_first().map(TransactionNumber)
    }

    fn count(&self, notary: &NotaryId) -> usize {
        self.sets().get(notary).map_or(0, BTreeSet::len)
    }
}

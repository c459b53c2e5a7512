use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::traits::{Key, Version};

/// What happened when a confirmed write was offered to the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// First confirmed write for the key.
    Inserted,
    /// The key moved to a larger value.
    Advanced { previous: Version },
    /// A completion older than what the map already holds; ignored.
    Stale { current: Version },
}

/// Client-side record of the last value each key was confirmed to hold.
///
/// Sharded so that many write completions can land at once while the checker
/// walks the map. Values only move forward: a write that completes after a
/// newer write for the same key does not pull the expectation back.
#[derive(Debug, Clone, Default)]
pub struct ExpectedState {
    inner: Arc<DashMap<Key, Version>>,
}

impl ExpectedState {
    pub fn new() -> Self {
        ExpectedState {
            inner: Arc::new(DashMap::new()),
        }
    }

    /// Record a write the store acknowledged.
    pub fn record(&self, key: Key, value: Version) -> Recorded {
        match self.inner.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(value);
                Recorded::Inserted
            }
            Entry::Occupied(mut slot) => {
                let current = *slot.get();
                if value > current {
                    slot.insert(value);
                    Recorded::Advanced { previous: current }
                } else {
                    Recorded::Stale { current }
                }
            }
        }
    }

    pub fn get(&self, key: Key) -> Option<Version> {
        self.inner.get(&key).map(|v| *v)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Copy of the current entries, sorted by key.
    ///
    /// Each shard is locked only while it is copied, so writers stall for at
    /// most one shard's worth of entries. Keys written during the copy may or
    /// may not appear.
    pub fn snapshot(&self) -> Vec<(Key, Version)> {
        let mut entries: Vec<(Key, Version)> =
            self.inner.iter().map(|e| (*e.key(), *e.value())).collect();
        entries.sort_unstable_by_key(|(k, _)| *k);
        entries
    }
}

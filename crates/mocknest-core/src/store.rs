//! In-memory mock store with atomically swappable snapshots
//!
//! Matchers read a shared immutable snapshot; the loader and control plane
//! replace the whole catalog under a writer lock. Swapping resets the
//! sequence cursor table but leaves script state and the active scenario
//! alone.

use crate::catalog::MockRecord;
use crate::sequence::SequenceCursors;
use parking_lot::RwLock;
use std::sync::Arc;

/// Priority-sorted mock catalog behind a reader/writer lock
pub struct MockStore {
    records: RwLock<Arc<[MockRecord]>>,
    cursors: Arc<SequenceCursors>,
}

impl MockStore {
    /// Create a store over the given records, sorting them for matching
    pub fn new(records: Vec<MockRecord>, cursors: Arc<SequenceCursors>) -> Self {
        Self {
            records: RwLock::new(Self::sorted(records)),
            cursors,
        }
    }

    /// Create an empty store
    pub fn empty(cursors: Arc<SequenceCursors>) -> Self {
        Self::new(Vec::new(), cursors)
    }

    // Stable sort keeps definition order within equal priorities.
    fn sorted(mut records: Vec<MockRecord>) -> Arc<[MockRecord]> {
        records.sort_by(|a, b| b.priority.cmp(&a.priority));
        records.into()
    }

    /// Cheap shared view of the current catalog. The snapshot is immutable;
    /// a concurrent swap does not affect callers already holding one.
    pub fn snapshot(&self) -> Arc<[MockRecord]> {
        self.records.read().clone()
    }

    /// Replace the catalog. Sorts, publishes atomically, and resets the
    /// sequence cursor table. Returns the number of records now active.
    pub fn swap(&self, records: Vec<MockRecord>) -> usize {
        let sorted = Self::sorted(records);
        let count = sorted.len();
        {
            let mut guard = self.records.write();
            *guard = sorted;
            self.cursors.reset();
        }
        count
    }

    /// Number of records in the current snapshot
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scenario tags present in the current snapshot, sorted and unique
    pub fn scenarios(&self) -> Vec<String> {
        let snapshot = self.snapshot();
        let mut tags: Vec<String> =
            snapshot.iter().flat_map(|m| m.scenarios.iter().cloned()).collect();
        tags.sort();
        tags.dedup();
        tags
    }
}

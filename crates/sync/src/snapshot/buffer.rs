use std::collections::VecDeque;

use super::state::StateSnapshot;

pub const DEFAULT_MAX_SNAPSHOTS: usize = 32;

const MIN_RETAINED: usize = 2;

/// Bounded FIFO of snapshots in arrival order. Snapshots are not re-sorted by
/// timestamp.
#[derive(Debug, Clone)]
pub struct SnapshotBuffer {
    snapshots: VecDeque<StateSnapshot>,
    capacity: usize,
}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SNAPSHOTS)
    }
}

impl SnapshotBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            snapshots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, snapshot: StateSnapshot) -> usize {
        self.snapshots.push_back(snapshot);

        let mut evicted = 0;
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn get(&self, index: usize) -> Option<&StateSnapshot> {
        self.snapshots.get(index)
    }

    pub fn oldest(&self) -> Option<&StateSnapshot> {
        self.snapshots.front()
    }

    pub fn latest(&self) -> Option<&StateSnapshot> {
        self.snapshots.back()
    }

    pub fn latest_pair(&self) -> Option<(&StateSnapshot, &StateSnapshot)> {
        let len = self.snapshots.len();
        if len < 2 {
            return None;
        }
        Some((&self.snapshots[len - 2], &self.snapshots[len - 1]))
    }

    pub fn index_at_or_before(&self, time: f64) -> Option<usize> {
        self.snapshots
            .iter()
            .rposition(|snapshot| snapshot.timestamp <= time)
    }

    /// Drops leading snapshots older than `cutoff`, always keeping the two most
    /// recent. Returns the number removed.
    pub fn prune_older_than(&mut self, cutoff: f64) -> usize {
        let mut removed = 0;
        while self.snapshots.len() > MIN_RETAINED
            && self.snapshots.front().is_some_and(|s| s.timestamp < cutoff)
        {
            self.snapshots.pop_front();
            removed += 1;
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = &StateSnapshot> {
        self.snapshots.iter()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

//! Recompute Heap
//!
//! The height-bucketed work queue of nodes due for recomputation. Each
//! bucket is a [`KeyedList`], giving O(1) membership tests, O(1) insert, and
//! O(1) removal by node id; taking the whole minimum bucket is O(bucket).
//!
//! Nodes at the same height can never be in a parent/child relationship
//! (the height invariant forces `height(parent) < height(child)`), so the
//! contents of one bucket are mutually independent. That independence is
//! what lets the parallel driver recompute an entire bucket concurrently
//! with no ordering requirement inside it.
//!
//! A node appears at most once, always in the bucket matching its current
//! height. When a height-repair pass raises a queued node, [`RecomputeHeap::fix`]
//! moves it to the right bucket.

use std::collections::HashMap;

use crate::containers::KeyedList;
use crate::error::{Error, Result};
use crate::ident::NodeId;

pub struct RecomputeHeap {
    /// One keyed list per height.
    buckets: Vec<KeyedList<NodeId, ()>>,
    /// Which bucket each queued node is in.
    lookup: HashMap<NodeId, i32>,
    /// Lower bound on the first populated bucket.
    min_height: i32,
    /// Configured ceiling; adding above it is an error.
    max_height: i32,
}

impl RecomputeHeap {
    /// Create a heap accepting heights `0..=max_height`.
    pub fn new(max_height: i32) -> Self {
        let buckets = (0..=max_height).map(|_| KeyedList::new()).collect();
        Self {
            buckets,
            lookup: HashMap::new(),
            min_height: 0,
            max_height,
        }
    }

    /// Number of queued nodes.
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    /// True if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// True if the node is queued.
    pub fn has(&self, id: &NodeId) -> bool {
        self.lookup.contains_key(id)
    }

    /// Queue a node at its height. Idempotent per id: re-adding a queued
    /// node moves it to the new bucket rather than duplicating it.
    pub fn add(&mut self, id: NodeId, height: i32) -> Result<()> {
        if height > self.max_height {
            return Err(Error::HeightLimitExceeded {
                height,
                max_height: self.max_height,
            });
        }
        debug_assert!(height >= 0, "queued node must have a concrete height");
        let height = height.max(0);

        if let Some(&current) = self.lookup.get(&id) {
            if current == height {
                return Ok(());
            }
            self.buckets[current as usize].remove(&id);
        }
        self.buckets[height as usize].push_back(id, ());
        self.lookup.insert(id, height);
        if height < self.min_height {
            self.min_height = height;
        }
        Ok(())
    }

    /// Remove a node wherever it is queued. Returns true if it was present.
    pub fn remove(&mut self, id: &NodeId) -> bool {
        match self.lookup.remove(id) {
            Some(height) => {
                self.buckets[height as usize].remove(id);
                true
            }
            None => false,
        }
    }

    /// Re-bucket a queued node after its height changed. No-op if the node
    /// is not queued.
    pub fn fix(&mut self, id: NodeId, new_height: i32) -> Result<()> {
        if self.has(&id) {
            self.add(id, new_height)?;
        }
        Ok(())
    }

    /// Remove and return the single oldest node at the minimum populated
    /// height.
    pub fn remove_min(&mut self) -> Option<NodeId> {
        let height = self.first_populated()?;
        let (id, _) = self.buckets[height as usize].pop_front()?;
        self.lookup.remove(&id);
        self.min_height = height;
        Some(id)
    }

    /// Atomically remove and return every node at the minimum populated
    /// height, in queue order.
    pub fn remove_min_height(&mut self) -> Vec<NodeId> {
        let Some(height) = self.first_populated() else {
            return Vec::new();
        };
        let ids = self.buckets[height as usize].drain_keys();
        for id in &ids {
            self.lookup.remove(id);
        }
        self.min_height = height;
        ids
    }

    /// Scan forward from the cached minimum to the first non-empty bucket.
    fn first_populated(&self) -> Option<i32> {
        if self.lookup.is_empty() {
            return None;
        }
        (self.min_height..=self.max_height).find(|&h| !self.buckets[h as usize].is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent_and_moves() {
        let mut heap = RecomputeHeap::new(8);
        let id = NodeId::new();

        heap.add(id, 3).unwrap();
        heap.add(id, 3).unwrap();
        assert_eq!(heap.len(), 1);

        // Re-add at a new height moves the node.
        heap.add(id, 5).unwrap();
        assert_eq!(heap.len(), 1);
        assert_eq!(heap.remove_min(), Some(id));
        assert!(heap.is_empty());
    }

    #[test]
    fn remove_min_respects_height_order() {
        let mut heap = RecomputeHeap::new(8);
        let low = NodeId::new();
        let mid = NodeId::new();
        let high = NodeId::new();

        heap.add(high, 7).unwrap();
        heap.add(low, 0).unwrap();
        heap.add(mid, 3).unwrap();

        assert_eq!(heap.remove_min(), Some(low));
        assert_eq!(heap.remove_min(), Some(mid));
        assert_eq!(heap.remove_min(), Some(high));
        assert_eq!(heap.remove_min(), None);
    }

    #[test]
    fn remove_min_height_takes_whole_bucket() {
        let mut heap = RecomputeHeap::new(8);
        let a = NodeId::new();
        let b = NodeId::new();
        let c = NodeId::new();

        heap.add(a, 2).unwrap();
        heap.add(b, 2).unwrap();
        heap.add(c, 4).unwrap();

        let batch = heap.remove_min_height();
        assert_eq!(batch, vec![a, b]);
        assert_eq!(heap.remove_min_height(), vec![c]);
        assert!(heap.remove_min_height().is_empty());
    }

    #[test]
    fn adding_below_cached_min_is_found() {
        let mut heap = RecomputeHeap::new(8);
        let a = NodeId::new();
        let b = NodeId::new();

        heap.add(a, 6).unwrap();
        assert_eq!(heap.remove_min(), Some(a));

        // Min cache is now 6; a lower insert must still be found first.
        heap.add(a, 7).unwrap();
        heap.add(b, 1).unwrap();
        assert_eq!(heap.remove_min(), Some(b));
        assert_eq!(heap.remove_min(), Some(a));
    }

    #[test]
    fn removal_by_id() {
        let mut heap = RecomputeHeap::new(8);
        let a = NodeId::new();
        let b = NodeId::new();

        heap.add(a, 1).unwrap();
        heap.add(b, 1).unwrap();
        assert!(heap.remove(&a));
        assert!(!heap.remove(&a));
        assert_eq!(heap.remove_min(), Some(b));
    }

    #[test]
    fn fix_rebuckets_only_queued_nodes() {
        let mut heap = RecomputeHeap::new(8);
        let a = NodeId::new();
        let b = NodeId::new();

        heap.add(a, 1).unwrap();
        heap.fix(a, 4).unwrap();
        heap.fix(b, 2).unwrap(); // not queued, no-op

        assert_eq!(heap.len(), 1);
        assert_eq!(heap.remove_min(), Some(a));
    }

    #[test]
    fn height_past_ceiling_is_rejected() {
        let mut heap = RecomputeHeap::new(4);
        let err = heap.add(NodeId::new(), 5).unwrap_err();
        assert!(matches!(
            err,
            Error::HeightLimitExceeded {
                height: 5,
                max_height: 4
            }
        ));
        assert!(heap.is_empty());
    }
}

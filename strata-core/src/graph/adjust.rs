//! Adjust-Heights Heap
//!
//! Transient structure used only while repairing the height invariant after
//! new edges are added. A naive DFS can revisit nodes many times in
//! degenerate diamond graphs; batching the relaxation through a height-ordered
//! heap visits each raised node once per final height instead.
//!
//! # Algorithm
//!
//! 1. Seed the heap with `ensure_height_requirement(child, parent)` for the
//!    new edge(s): whenever `height(parent) >= height(child)`, the child is
//!    raised to `height(parent) + 1` and (re)inserted.
//! 2. Drain from the lowest populated height upward. For each drained node:
//!    fix its recompute-heap bucket, apply the requirement to every child,
//!    and, if the node is a bind, apply it between the bind and every
//!    necessary node on its active right-hand side, because a bind's
//!    effective height must exceed the subgraph it has spliced in.
//!
//! Heights only ever rise and the ceiling is finite, so the sweep terminates
//! or reports [`Error::HeightLimitExceeded`].
//!
//! The heap is cleared at the start of every repair pass and is empty at the
//! end. The `height_lower_bound` watermark keeps repeated min-removal from
//! rescanning already-drained heights.

use std::collections::HashMap;

use tracing::trace;

use crate::containers::KeyedList;
use crate::error::{Error, Result};
use crate::graph::heap::RecomputeHeap;
use crate::graph::node::{Node, HEIGHT_UNSET};
use crate::graph::Arena;
use crate::ident::NodeId;

pub struct AdjustHeightsHeap {
    buckets: Vec<KeyedList<NodeId, ()>>,
    /// Which bucket each pending node is in.
    placed: HashMap<NodeId, i32>,
    /// Drained heights are never revisited.
    height_lower_bound: i32,
    /// Highest height handed out this pass.
    max_height_seen: i32,
    max_height: i32,
}

impl AdjustHeightsHeap {
    pub fn new(max_height: i32) -> Self {
        let buckets = (0..=max_height).map(|_| KeyedList::new()).collect();
        Self {
            buckets,
            placed: HashMap::new(),
            height_lower_bound: 0,
            max_height_seen: 0,
            max_height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.placed.is_empty()
    }

    /// Reset for a fresh repair pass.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.drain_keys();
        }
        self.placed.clear();
        self.height_lower_bound = 0;
        self.max_height_seen = 0;
    }

    /// Assign a node a new (strictly larger) height, with bookkeeping.
    pub fn set_height(&mut self, node: &mut Node, height: i32) -> Result<()> {
        if height > self.max_height {
            return Err(Error::HeightLimitExceeded {
                height,
                max_height: self.max_height,
            });
        }
        if height > self.max_height_seen {
            self.max_height_seen = height;
        }
        trace!(node = %node.id(), from = node.height, to = height, "raising height");
        node.height = height;
        Ok(())
    }

    /// If `height(parent) >= height(child)`, raise the child just above the
    /// parent and queue it for relaxation. Detached children are left alone;
    /// they get a height when they are discovered.
    pub fn ensure_height_requirement(
        &mut self,
        nodes: &mut Arena,
        child: NodeId,
        parent: NodeId,
    ) -> Result<()> {
        if child == parent {
            return Ok(());
        }
        let parent_height = match nodes.get(&parent) {
            Some(p) => p.height,
            None => return Ok(()),
        };
        let child_height = match nodes.get(&child) {
            Some(c) => c.height,
            None => return Ok(()),
        };
        if child_height == HEIGHT_UNSET || parent_height < child_height {
            return Ok(());
        }

        // Remove any stale placement before re-inserting under the new height.
        if let Some(old) = self.placed.remove(&child) {
            self.buckets[old as usize].remove(&child);
        }
        let new_height = parent_height + 1;
        if let Some(node) = nodes.get_mut(&child) {
            self.set_height(node, new_height)?;
        }
        self.buckets[new_height as usize].push_back(child, ());
        self.placed.insert(child, new_height);
        Ok(())
    }

    /// Drain the heap from its lowest populated height upward, fixing the
    /// recompute heap and relaxing children (and bind right-hand sides) as
    /// it goes.
    pub fn adjust_heights(&mut self, nodes: &mut Arena, recompute: &mut RecomputeHeap) -> Result<()> {
        while let Some(id) = self.remove_min() {
            let (height, children, bind_rhs) = match nodes.get(&id) {
                Some(node) => {
                    let rhs: Vec<NodeId> = node
                        .bind_state()
                        .map(|state| state.scope.created().to_vec())
                        .unwrap_or_default();
                    (node.height, node.children.clone(), rhs)
                }
                None => continue,
            };
            recompute.fix(id, height)?;
            for child in children {
                self.ensure_height_requirement(nodes, child, id)?;
            }
            // A bind must sit above every necessary node it spliced in.
            for rhs in bind_rhs {
                let necessary = nodes.get(&rhs).map(Node::is_necessary).unwrap_or(false);
                if necessary {
                    self.ensure_height_requirement(nodes, id, rhs)?;
                }
            }
        }
        Ok(())
    }

    fn remove_min(&mut self) -> Option<NodeId> {
        if self.placed.is_empty() {
            return None;
        }
        let height =
            (self.height_lower_bound..=self.max_height_seen).find(|&h| !self.buckets[h as usize].is_empty())?;
        let (id, _) = self.buckets[height as usize].pop_front()?;
        self.placed.remove(&id);
        self.height_lower_bound = height;
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::NodeKind;
    use indexmap::IndexMap;

    fn arena_chain(heights: &[i32]) -> (Arena, Vec<NodeId>) {
        // Build a parent -> child chain with the given starting heights.
        let mut nodes: Arena = IndexMap::new();
        let mut ids = Vec::new();
        for &h in heights {
            let mut node = Node::new(NodeKind::Var { pending: None });
            node.height = h;
            ids.push(node.id());
            nodes.insert(node.id(), node);
        }
        for pair in ids.windows(2) {
            let (parent, child) = (pair[0], pair[1]);
            nodes.get_mut(&parent).unwrap().children.push(child);
            nodes.get_mut(&child).unwrap().parents.push(parent);
        }
        (nodes, ids)
    }

    #[test]
    fn raises_transitively_down_a_chain() {
        // Chain a -> b -> c with heights 0, 1, 2; then pretend a was raised
        // to 5 and repair.
        let (mut nodes, ids) = arena_chain(&[0, 1, 2]);
        nodes.get_mut(&ids[0]).unwrap().height = 5;

        let mut heap = AdjustHeightsHeap::new(64);
        let mut recompute = RecomputeHeap::new(64);
        heap.clear();
        heap.ensure_height_requirement(&mut nodes, ids[1], ids[0]).unwrap();
        heap.adjust_heights(&mut nodes, &mut recompute).unwrap();

        assert_eq!(nodes[&ids[1]].height, 6);
        assert_eq!(nodes[&ids[2]].height, 7);
        assert!(heap.is_empty());
    }

    #[test]
    fn rebuckets_queued_nodes_in_recompute_heap() {
        let (mut nodes, ids) = arena_chain(&[0, 1]);
        nodes.get_mut(&ids[0]).unwrap().height = 3;

        let mut recompute = RecomputeHeap::new(64);
        recompute.add(ids[1], 1).unwrap();

        let mut heap = AdjustHeightsHeap::new(64);
        heap.clear();
        heap.ensure_height_requirement(&mut nodes, ids[1], ids[0]).unwrap();
        heap.adjust_heights(&mut nodes, &mut recompute).unwrap();

        // The queued child moved to its corrected bucket.
        assert_eq!(nodes[&ids[1]].height, 4);
        assert!(recompute.has(&ids[1]));
        assert_eq!(recompute.remove_min(), Some(ids[1]));
    }

    #[test]
    fn detached_children_are_not_raised() {
        let (mut nodes, ids) = arena_chain(&[4, HEIGHT_UNSET]);
        let mut heap = AdjustHeightsHeap::new(64);
        heap.clear();
        heap.ensure_height_requirement(&mut nodes, ids[1], ids[0]).unwrap();
        assert!(heap.is_empty());
        assert_eq!(nodes[&ids[1]].height, HEIGHT_UNSET);
    }

    #[test]
    fn reports_height_limit() {
        let (mut nodes, ids) = arena_chain(&[3, 3]);
        let mut heap = AdjustHeightsHeap::new(3);
        heap.clear();
        let err = heap
            .ensure_height_requirement(&mut nodes, ids[1], ids[0])
            .unwrap_err();
        assert!(matches!(err, Error::HeightLimitExceeded { height: 4, max_height: 3 }));
    }

    #[test]
    fn satisfied_requirement_is_a_no_op() {
        let (mut nodes, ids) = arena_chain(&[0, 5]);
        let mut heap = AdjustHeightsHeap::new(64);
        heap.clear();
        heap.ensure_height_requirement(&mut nodes, ids[1], ids[0]).unwrap();
        assert!(heap.is_empty());
        assert_eq!(nodes[&ids[1]].height, 5);
    }
}

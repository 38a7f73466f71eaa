//! Observers
//!
//! An observer is a root handle that keeps a subgraph attached to a graph
//! and eligible for recomputation. Observing a node walks its parent chain
//! registering the observer on every reachable node (computing heights
//! lazily as it goes); unobserving walks the same chain decrementing, and
//! any node whose observer accounting empties is released from the graph.
//!
//! Observers are degenerate: they never enter the recompute heap and have
//! no value of their own.

use crate::ident::{NodeId, ObserverId};

/// A live observation of one node.
#[derive(Debug, Clone, Copy)]
pub struct Observer {
    id: ObserverId,
    node: NodeId,
}

impl Observer {
    pub(crate) fn new(node: NodeId) -> Self {
        Self {
            id: ObserverId::new(),
            node,
        }
    }

    /// The observer's identifier.
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// The node this observer roots.
    pub fn node(&self) -> NodeId {
        self.node
    }
}

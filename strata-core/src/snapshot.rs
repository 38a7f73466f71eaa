//! Graph Snapshots
//!
//! Serializable views of graph structure for debugging and external
//! tooling. Snapshots carry topology and bookkeeping (heights, edges,
//! timestamps, observer counts) but never node values, which are opaque to
//! the engine.

use serde::Serialize;

use crate::graph::Graph;
use crate::ident::{GraphId, NodeId};

/// A point-in-time view of one node's metadata.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub kind: String,
    pub height: i32,
    pub parents: Vec<NodeId>,
    pub children: Vec<NodeId>,
    pub set_at: u64,
    pub changed_at: u64,
    pub recomputed_at: u64,
    pub observer_count: usize,
}

/// A point-in-time view of every observed node in a graph.
#[derive(Debug, Clone, Serialize)]
pub struct GraphSnapshot {
    pub graph_id: GraphId,
    pub stabilization_num: u64,
    pub recompute_count: u64,
    pub nodes: Vec<NodeSnapshot>,
}

impl Graph {
    /// Snapshot one node's metadata.
    pub fn node_snapshot(&self, id: NodeId) -> Option<NodeSnapshot> {
        let node = self.node(id)?;
        Some(NodeSnapshot {
            id: node.id(),
            label: node.label.clone(),
            kind: format!("{:?}", node.kind),
            height: node.height(),
            parents: node.parents.to_vec(),
            children: node.children.to_vec(),
            set_at: node.set_at,
            changed_at: node.changed_at,
            recomputed_at: node.recomputed_at,
            observer_count: node.observer_count(),
        })
    }

    /// Snapshot the observed portion of the graph, in discovery order.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            graph_id: self.id(),
            stabilization_num: self.stabilization_num(),
            recompute_count: self.recompute_count(),
            nodes: self
                .observed_nodes()
                .filter_map(|id| self.node_snapshot(id))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::val;

    #[test]
    fn snapshot_covers_only_observed_nodes() {
        let mut g = Graph::new();
        let a = g.var(1_i64);
        let b = g
            .compute(&[a], |i| Ok(val(i.require::<i64>(0)? + 1)))
            .unwrap();
        let _orphan = g.var(99_i64);
        g.observe(b).unwrap();
        g.stabilize().unwrap();

        let snap = g.snapshot();
        assert_eq!(snap.nodes.len(), 2);
        assert_eq!(snap.stabilization_num, 1);
        let b_snap = snap.nodes.iter().find(|n| n.id == b).unwrap();
        assert_eq!(b_snap.height, 1);
        assert_eq!(b_snap.parents, vec![a]);
        assert_eq!(b_snap.kind, "Compute");
    }

    #[test]
    fn snapshots_serialize_to_json() {
        let mut g = Graph::new();
        let a = g.var(1_i64);
        g.set_label(a, "input").unwrap();
        g.observe(a).unwrap();
        g.stabilize().unwrap();

        let json = serde_json::to_value(g.snapshot()).unwrap();
        assert_eq!(json["stabilization_num"], 1);
        let node = &json["nodes"][0];
        assert_eq!(node["label"], "input");
        assert_eq!(node["kind"], "Var");
        assert_eq!(node["height"], 0);
        assert!(node["id"].is_string());
    }
}

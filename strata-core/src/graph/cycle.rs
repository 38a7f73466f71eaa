//! Cycle Detection
//!
//! Pure check run before any dynamically added edge is committed: would the
//! edge parent -> child create a cycle? The height-repair sweep assumes a
//! DAG and does not terminate on cycles, so every edge insertion (manual
//! links, bind rewiring, dynamic fan-in) goes through this first.
//!
//! The walk explores the parent chain from the prospective parent, treating
//! the prospective edge as already present; it answers true the moment it
//! reaches the prospective child. The seen-set is not needed for
//! correctness on a DAG, only to avoid exponential blowup on diamonds.

use std::collections::HashSet;

use crate::graph::Arena;
use crate::ident::NodeId;

/// Would adding the edge `parent -> child` create a cycle?
pub(crate) fn would_create_cycle(nodes: &Arena, child: NodeId, parent: NodeId) -> bool {
    if child == parent {
        return true;
    }
    reaches(nodes, child, parent)
}

/// True if `target` is reachable from `from` via parent edges. Iterative,
/// since an ancestor chain can be arbitrarily long.
fn reaches(nodes: &Arena, target: NodeId, from: NodeId) -> bool {
    let mut seen = HashSet::new();
    let mut stack = vec![from];
    while let Some(id) = stack.pop() {
        if id == target {
            return true;
        }
        if !seen.insert(id) {
            continue;
        }
        if let Some(node) = nodes.get(&id) {
            stack.extend(node.parents.iter().copied());
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::{Node, NodeKind};
    use indexmap::IndexMap;

    fn arena(n: usize) -> (Arena, Vec<NodeId>) {
        let mut nodes: Arena = IndexMap::new();
        let mut ids = Vec::new();
        for _ in 0..n {
            let node = Node::new(NodeKind::Var { pending: None });
            ids.push(node.id());
            nodes.insert(node.id(), node);
        }
        (nodes, ids)
    }

    fn edge(nodes: &mut Arena, parent: NodeId, child: NodeId) {
        nodes.get_mut(&parent).unwrap().children.push(child);
        nodes.get_mut(&child).unwrap().parents.push(parent);
    }

    #[test]
    fn self_edge_is_a_cycle() {
        let (nodes, ids) = arena(1);
        assert!(would_create_cycle(&nodes, ids[0], ids[0]));
    }

    #[test]
    fn chain_back_edge_is_a_cycle() {
        // a -> b -> c; adding c -> a closes the loop.
        let (mut nodes, ids) = arena(3);
        edge(&mut nodes, ids[0], ids[1]);
        edge(&mut nodes, ids[1], ids[2]);

        assert!(would_create_cycle(&nodes, ids[0], ids[2]));
        // The forward direction stays legal.
        assert!(!would_create_cycle(&nodes, ids[2], ids[0]));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        // a -> b, a -> c, b -> d, c -> d.
        let (mut nodes, ids) = arena(4);
        edge(&mut nodes, ids[0], ids[1]);
        edge(&mut nodes, ids[0], ids[2]);
        edge(&mut nodes, ids[1], ids[3]);
        edge(&mut nodes, ids[2], ids[3]);

        assert!(!would_create_cycle(&nodes, ids[3], ids[0]));
        assert!(would_create_cycle(&nodes, ids[0], ids[3]));
    }

    #[test]
    fn unrelated_nodes_are_legal() {
        let (nodes, ids) = arena(2);
        assert!(!would_create_cycle(&nodes, ids[0], ids[1]));
    }
}

//! Bind Machinery
//!
//! A bind node delegates its value to a dynamically chosen subgraph. When
//! one of its left-hand-side inputs changes, its hook runs inside a fresh
//! scope and returns the root of the replacement right-hand side. If the
//! returned root differs by identity from the previous one, the bind
//! unlinks (and undiscovers) the old branch and links (and discovers) the
//! new one; an identity-equal root is a no-op, so reruns with the same
//! effective inputs never churn the graph.
//!
//! # Value adoption
//!
//! A freshly spliced-in right-hand side has not computed yet when the bind
//! itself recomputes: the bind was popped at its old height, and the new
//! subgraph sits below its repaired height. The bind therefore *defers*:
//! it re-queues itself at its raised height and adopts the right-hand-side
//! root's value on a later pop, once that root has settled. The `bound_at`
//! stamp keeps the hook from rerunning on the second pop.

use tracing::trace;

use crate::error::{Error, Result};
use crate::graph::cycle::would_create_cycle;
use crate::graph::node::Value;
use crate::graph::scope::Scope;
use crate::graph::Graph;
use crate::ident::NodeId;

/// Outcome of recomputing a bind node.
pub(crate) enum BindValue {
    /// The active right-hand side has settled; adopt its value.
    Ready(Value),
    /// The right-hand side is still pending; re-queue the bind above it.
    Deferred,
}

impl Graph {
    /// Recompute a bind node: rerun the hook if a left-hand-side input
    /// changed since it last ran, commit any rewiring, then adopt or defer.
    pub(crate) fn recompute_bind(&mut self, id: NodeId, pass: u64) -> Result<BindValue> {
        let (f, lhs, old_root, bound_at) = {
            let node = self.nodes.get(&id).ok_or(Error::UnknownNode { id })?;
            let state = node.bind_state().ok_or(Error::UnknownNode { id })?;
            (
                state.f.clone(),
                state.lhs.clone(),
                state.rhs_root,
                state.bound_at,
            )
        };

        let lhs_changed = bound_at == 0
            || lhs.iter().any(|p| {
                self.nodes
                    .get(p)
                    .map(|n| n.changed_at > bound_at)
                    .unwrap_or(false)
            });

        if lhs_changed {
            let inputs = self.gather_inputs(&lhs);
            self.push_scope(Scope::bind(id));
            let result = (f)(self, &inputs);
            let new_scope = self.pop_scope();

            // A failing hook aborts without committing any relinking; its
            // half-built nodes are reclaimed.
            let new_root = match result {
                Ok(root) => root,
                Err(e) => {
                    self.sweep_scope(new_scope.created());
                    return Err(Error::Compute { node: id, source: e });
                }
            };
            if !self.nodes.contains_key(&new_root) {
                return Err(Error::UnknownNode { id: new_root });
            }
            if let Some(state) = self.nodes.get_mut(&id).and_then(|n| n.bind_state_mut()) {
                state.bound_at = pass;
            }

            if old_root != Some(new_root) {
                if would_create_cycle(&self.nodes, id, new_root) {
                    return Err(Error::Cycle {
                        child: id,
                        parent: new_root,
                    });
                }
                if let Some(old) = old_root {
                    // Detaches the old branch and undiscovers everything only
                    // it kept necessary.
                    self.unlink(id, old)?;
                }
                // Install the new scope before linking so the height-repair
                // sweep can hold the bind above its spliced-in subgraph. The
                // replaced scope is the undo-log of the previous hook run;
                // once the new branch is wired in, anything it created that
                // nothing references anymore is dropped from the arena.
                let replaced = self
                    .nodes
                    .get_mut(&id)
                    .and_then(|n| n.bind_state_mut())
                    .map(|state| {
                        state.rhs_root = Some(new_root);
                        std::mem::replace(&mut state.scope, new_scope)
                    });
                self.link(id, &[new_root])?;
                if let Some(replaced) = replaced {
                    self.sweep_scope(replaced.created());
                }
                trace!(bind = ?id, root = ?new_root, "rebound");
            } else {
                // Identity-equal root: keep the existing wiring and reclaim
                // whatever the rerun built alongside it.
                self.sweep_scope(new_scope.created());
            }
        }

        let rhs = self
            .nodes
            .get(&id)
            .and_then(|n| n.bind_state())
            .and_then(|s| s.rhs_root)
            .ok_or_else(|| Error::Compute {
                node: id,
                source: "bind has no right-hand side".into(),
            })?;

        let pending = self.heap.lock().has(&rhs);
        match self.nodes.get(&rhs).and_then(|n| n.value.clone()) {
            Some(value) if !pending => Ok(BindValue::Ready(value)),
            _ => Ok(BindValue::Deferred),
        }
    }
}

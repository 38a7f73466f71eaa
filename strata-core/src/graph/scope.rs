//! Scopes
//!
//! A scope identifies the graph region a node was constructed in: the
//! top-level graph, or the body of one particular bind invocation. Binds use
//! their scope as an undo-log of the nodes their callback created,
//! so a whole dynamically-created subtree can be discovered or undiscovered
//! as a unit when the bind switches its active branch, and so the
//! height-repair sweep can keep a bind above its spliced-in subgraph.

use crate::ident::NodeId;

/// The graph region a set of nodes was created in.
#[derive(Debug, Clone)]
pub struct Scope {
    /// The bind owning this scope, or `None` for the graph's top scope.
    bind: Option<NodeId>,
    /// Undo-log: nodes created inside this scope, in creation order.
    created: Vec<NodeId>,
}

impl Scope {
    /// The top-level scope. One per graph; its undo-log is never replayed.
    pub fn top() -> Self {
        Self {
            bind: None,
            created: Vec::new(),
        }
    }

    /// A fresh scope for one invocation of a bind's callback.
    pub fn bind(bind: NodeId) -> Self {
        Self {
            bind: Some(bind),
            created: Vec::new(),
        }
    }

    /// True for the graph's top scope.
    pub fn is_top(&self) -> bool {
        self.bind.is_none()
    }

    /// The owning bind, if any.
    pub fn bind_node(&self) -> Option<NodeId> {
        self.bind
    }

    /// Nodes created inside this scope, in creation order.
    pub fn created(&self) -> &[NodeId] {
        &self.created
    }

    /// Record a node constructed while this scope was current.
    pub(crate) fn record(&mut self, id: NodeId) {
        // The top scope owns everything created outside binds; it has no
        // rebind to unwind, so there is nothing to log.
        if self.bind.is_some() {
            self.created.push(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_scope_does_not_log() {
        let mut scope = Scope::top();
        assert!(scope.is_top());
        scope.record(NodeId::new());
        assert!(scope.created().is_empty());
    }

    #[test]
    fn bind_scope_logs_in_order() {
        let bind = NodeId::new();
        let mut scope = Scope::bind(bind);
        assert!(!scope.is_top());
        assert_eq!(scope.bind_node(), Some(bind));

        let a = NodeId::new();
        let b = NodeId::new();
        scope.record(a);
        scope.record(b);
        assert_eq!(scope.created(), &[a, b]);
    }
}

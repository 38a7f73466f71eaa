//! Graph Nodes
//!
//! This module defines the node record: per-node metadata (height, edge
//! lists, logical timestamps, observer accounting) plus the tagged
//! [`NodeKind`] that carries each kind's hooks. The engine matches on the
//! kind to decide what "recompute" means for a node, rather than probing for
//! capabilities at runtime.
//!
//! # Heights
//!
//! A node's height is an upper bound on the longest dependency chain ending
//! at it, and is the sole recomputation ordering key. For every edge
//! parent -> child the invariant `height(parent) < height(child)` holds once
//! both nodes are attached. Heights only ever increase while a node is
//! attached; they reset to [`HEIGHT_UNSET`] when the node is released.
//!
//! # Observer accounting
//!
//! A node is *necessary* while it is reachable from at least one live
//! observer. Each node keeps, per observer, a count of how many of its
//! dependents are necessary for that observer (plus one if the observer is
//! registered on the node directly). Counting dependents rather than paths
//! makes discovery and undiscovery linear in the edges touched and exact on
//! diamond-shaped graphs.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::BoxError;
use crate::ident::{NodeId, ObserverId};
use crate::graph::scope::Scope;
use crate::graph::Graph;

/// Height value of a node that is not attached to any observer.
pub const HEIGHT_UNSET: i32 = -1;

/// A type-erased node value. Values are shared by `Arc` so a parent's output
/// can be handed to many children (and to parallel workers) without copying.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Compute hook for derived nodes: parent values in, new value out.
pub type ComputeFn = Arc<dyn Fn(&Inputs) -> Result<Value, BoxError> + Send + Sync>;

/// Cutoff predicate `(old, new)`. Returning `true` suppresses propagation:
/// the node keeps its previous value and its children are not scheduled.
pub type CutoffFn = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Bind hook: given the left-hand-side input values, build (or pick) the
/// replacement right-hand-side root. Runs with the graph's current scope set
/// to the bind's body, so nodes created inside are scope-tagged.
pub type BindFn = Arc<dyn Fn(&mut Graph, &Inputs) -> Result<NodeId, BoxError> + Send + Sync>;

/// Update handler invoked after a pass for each node whose value changed.
pub type UpdateFn = Box<dyn FnMut(&Value) + Send>;

/// Wrap a plain value as a node [`Value`].
pub fn val<T: Any + Send + Sync>(value: T) -> Value {
    Arc::new(value)
}

/// Snapshot of a node's parent values, in parent order, handed to compute
/// and bind hooks.
pub struct Inputs {
    values: Vec<Option<Value>>,
}

impl Inputs {
    pub(crate) fn new(values: Vec<Option<Value>>) -> Self {
        Self { values }
    }

    /// Number of inputs.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the node has no inputs.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get the raw value of input `i`, if it has been computed.
    pub fn get(&self, i: usize) -> Option<&Value> {
        self.values.get(i)?.as_ref()
    }

    /// Get input `i` downcast to `T`.
    pub fn value<T: Any + Send + Sync>(&self, i: usize) -> Option<&T> {
        self.get(i)?.downcast_ref::<T>()
    }

    /// Like [`Inputs::value`] but failing with a descriptive error, for use
    /// inside compute hooks.
    pub fn require<T: Any + Send + Sync>(&self, i: usize) -> Result<&T, BoxError> {
        self.value::<T>(i)
            .ok_or_else(|| format!("input {i} is missing or has an unexpected type").into())
    }
}

/// Mutable bind bookkeeping carried by bind nodes.
pub(crate) struct BindState {
    /// The user rebind hook.
    pub(crate) f: BindFn,
    /// Left-hand-side inputs; the bind reruns its hook when one changes.
    pub(crate) lhs: SmallVec<[NodeId; 2]>,
    /// Root of the active right-hand side, once bound.
    pub(crate) rhs_root: Option<NodeId>,
    /// Scope owning the nodes created by the last hook invocation.
    pub(crate) scope: Scope,
    /// Stabilization pass in which the hook last ran (0 = never).
    pub(crate) bound_at: u64,
}

/// The kind of a node, with the hooks specific to that kind.
pub(crate) enum NodeKind {
    /// An input set externally via `set_var`. The pending slot holds a value
    /// written between passes, committed when the node recomputes.
    Var { pending: Option<Value> },
    /// A derived value computed from its parents.
    Compute { f: ComputeFn },
    /// A dynamic-subgraph swap: delegates its value to the root chosen by
    /// its bind hook.
    Bind(BindState),
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Var { .. } => f.write_str("Var"),
            NodeKind::Compute { .. } => f.write_str("Compute"),
            NodeKind::Bind(_) => f.write_str("Bind"),
        }
    }
}

/// A node in the dependency graph.
///
/// "Parent" means input/dependency; "child" means dependent. Nodes are
/// created unattached (height unset, no observers) and become live when
/// reachable from an observer.
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) height: i32,
    pub(crate) parents: SmallVec<[NodeId; 2]>,
    pub(crate) children: SmallVec<[NodeId; 2]>,
    /// Pass number of the last external set.
    pub(crate) set_at: u64,
    /// Pass number of the last recompute that propagated a change.
    pub(crate) changed_at: u64,
    /// Pass number of the last recompute, changed or not.
    pub(crate) recomputed_at: u64,
    /// Per-observer necessity counts; see the module docs.
    pub(crate) observers: BTreeMap<ObserverId, u32>,
    pub(crate) value: Option<Value>,
    pub(crate) cutoff: Option<CutoffFn>,
    pub(crate) always_stale: bool,
    pub(crate) on_update: Vec<UpdateFn>,
    /// Bind whose scope this node was created in, if any.
    pub(crate) created_in: Option<NodeId>,
    pub(crate) label: Option<String>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self::with_id(NodeId::new(), kind)
    }

    /// Construct with a pre-minted id. Binds need their id before their
    /// state (the scope is tagged with it).
    pub(crate) fn with_id(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            height: HEIGHT_UNSET,
            parents: SmallVec::new(),
            children: SmallVec::new(),
            set_at: 0,
            changed_at: 0,
            recomputed_at: 0,
            observers: BTreeMap::new(),
            value: None,
            cutoff: None,
            always_stale: false,
            on_update: Vec::new(),
            created_in: None,
            label: None,
        }
    }

    /// The node's identifier.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Current height, or [`HEIGHT_UNSET`] while detached.
    pub fn height(&self) -> i32 {
        self.height
    }

    /// True while the node is reachable from at least one live observer.
    pub fn is_necessary(&self) -> bool {
        !self.observers.is_empty()
    }

    /// Number of distinct observers this node is reachable from.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub(crate) fn bind_state(&self) -> Option<&BindState> {
        match &self.kind {
            NodeKind::Bind(state) => Some(state),
            _ => None,
        }
    }

    pub(crate) fn bind_state_mut(&mut self) -> Option<&mut BindState> {
        match &mut self.kind {
            NodeKind::Bind(state) => Some(state),
            _ => None,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("height", &self.height)
            .field("parents", &self.parents.len())
            .field("children", &self.children.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_node_is_detached() {
        let node = Node::new(NodeKind::Var { pending: None });
        assert_eq!(node.height(), HEIGHT_UNSET);
        assert!(!node.is_necessary());
        assert_eq!(node.recomputed_at, 0);
    }

    #[test]
    fn kind_debug_and_state_access() {
        let var = Node::new(NodeKind::Var { pending: None });
        assert_eq!(format!("{:?}", var.kind), "Var");
        assert!(var.bind_state().is_none());

        let compute = Node::new(NodeKind::Compute {
            f: Arc::new(|_| Ok(val(0_i64))),
        });
        assert_eq!(format!("{:?}", compute.kind), "Compute");
        assert!(compute.bind_state().is_none());
    }

    #[test]
    fn inputs_downcast() {
        let inputs = Inputs::new(vec![Some(val(41_i64)), None]);
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs.value::<i64>(0), Some(&41));
        assert!(inputs.value::<String>(0).is_none());
        assert!(inputs.value::<i64>(1).is_none());
        assert!(inputs.require::<i64>(1).is_err());
    }

    #[test]
    fn observer_counts_track_necessity() {
        let mut node = Node::new(NodeKind::Var { pending: None });
        let obs = ObserverId::new();
        assert!(!node.is_necessary());

        *node.observers.entry(obs).or_insert(0) += 1;
        assert!(node.is_necessary());
        assert_eq!(node.observer_count(), 1);

        node.observers.remove(&obs);
        assert!(!node.is_necessary());
    }
}

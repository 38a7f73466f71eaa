//! Dependency Graph
//!
//! The [`Graph`] owns every node, the recompute heap, the observer table,
//! and the global stabilization counters. It is the single entry point for
//! building computations (`var` / `compute` / `bind`), rewiring them
//! (`link` / `unlink`), keeping subgraphs live (`observe` / `unobserve`),
//! and driving recomputation (`stabilize` / `parallel_stabilize`).
//!
//! # Ownership
//!
//! Nodes live in an arena keyed by [`NodeId`] and all traversal resolves
//! through id lookup, never through native references; parent and child
//! back-pointers are id lists. One graph owns a node for its whole life, and
//! several independent graphs can coexist in one process; there is no
//! global state.
//!
//! # Necessity
//!
//! A node is *necessary* (and eligible for recomputation) only while it is
//! reachable from a live observer. Observing a node discovers its whole
//! parent chain: observers are registered node by node, heights are computed
//! lazily bottom-up, and each newly necessary node is queued for its first
//! recompute. Undiscovery reverses the walk; a node whose accounting empties
//! is released (height reset, dequeued) but keeps its cached value, so a
//! subgraph that becomes necessary again later resumes cheaply.

pub(crate) mod adjust;
mod bind;
mod cycle;
pub(crate) mod heap;
pub(crate) mod node;
mod observer;
mod scope;
mod stabilize;

use std::any::Any;

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::error::{BoxError, Error, Result};
use crate::ident::{GraphId, NodeId, ObserverId};

use adjust::AdjustHeightsHeap;
use heap::RecomputeHeap;
use node::{BindState, NodeKind};
use smallvec::SmallVec;
use std::sync::Arc;

pub use node::{val, Inputs, Node, Value, HEIGHT_UNSET};
pub use observer::Observer;
pub use scope::Scope;
pub use stabilize::CancelToken;

/// The node arena: id-keyed, deterministically ordered.
pub(crate) type Arena = IndexMap<NodeId, Node>;

/// Tunables for one graph instance.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Ceiling on node heights; exceeding it is [`Error::HeightLimitExceeded`].
    pub max_height: i32,
    /// Worker count for `parallel_stabilize`; 0 means available parallelism.
    pub parallelism: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_height: 1024,
            parallelism: 0,
        }
    }
}

/// What the graph is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// No pass in progress.
    Idle,
    /// A stabilization pass is draining the recompute heap.
    Stabilizing,
    /// The pass finished; deferred update handlers are running.
    RunningUpdateHandlers,
}

/// An incremental computation graph.
pub struct Graph {
    id: GraphId,
    config: GraphConfig,
    pub(crate) nodes: Arena,
    /// Nodes currently reachable from at least one observer.
    pub(crate) observed: IndexSet<NodeId>,
    observers: IndexMap<ObserverId, Observer>,
    /// Guarded so scheduling bookkeeping and user-triggered staleness can
    /// share it; the lock is held only across O(1) structural operations,
    /// never across user compute calls.
    pub(crate) heap: Mutex<RecomputeHeap>,
    adjust: AdjustHeightsHeap,
    /// The graph's top scope plus one entry per bind callback in progress.
    top_scope: Scope,
    scope_stack: Vec<Scope>,
    pub(crate) stabilization_num: u64,
    pub(crate) status: Status,
    /// Inputs mutated while a pass was running; replayed for the next pass.
    pub(crate) set_during_stabilization: Mutex<Vec<NodeId>>,
    /// Nodes whose update handlers must run once the pass completes.
    pub(crate) pending_updates: Vec<NodeId>,
    /// Always-stale nodes seen this pass; re-queued at pass end.
    pub(crate) always_stale_seen: Vec<NodeId>,
    pub(crate) recompute_count: u64,
}

impl Graph {
    /// Create a graph with default configuration.
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    /// Create a graph with explicit configuration.
    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            id: GraphId::new(),
            heap: Mutex::new(RecomputeHeap::new(config.max_height)),
            adjust: AdjustHeightsHeap::new(config.max_height),
            config,
            nodes: IndexMap::new(),
            observed: IndexSet::new(),
            observers: IndexMap::new(),
            top_scope: Scope::top(),
            scope_stack: Vec::new(),
            stabilization_num: 0,
            status: Status::Idle,
            set_during_stabilization: Mutex::new(Vec::new()),
            pending_updates: Vec::new(),
            always_stale_seen: Vec::new(),
            recompute_count: 0,
        }
    }

    /// This graph's identifier.
    pub fn id(&self) -> GraphId {
        self.id
    }

    /// Number of completed stabilization passes.
    pub fn stabilization_num(&self) -> u64 {
        self.stabilization_num
    }

    /// Current status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Total node recomputations committed over the graph's lifetime.
    pub fn recompute_count(&self) -> u64 {
        self.recompute_count
    }

    /// Number of nodes the graph holds (attached or not).
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of nodes currently reachable from an observer.
    pub fn observed_count(&self) -> usize {
        self.observed.len()
    }

    /// True if the node is currently reachable from an observer.
    pub fn is_observed(&self, id: NodeId) -> bool {
        self.observed.contains(&id)
    }

    /// Ids of nodes currently reachable from an observer, in discovery order.
    pub fn observed_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.observed.iter().copied()
    }

    /// Borrow a node's record.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Create an input node holding `value`. Variables recompute only when
    /// set or when first discovered.
    pub fn var<T: Any + Send + Sync>(&mut self, value: T) -> NodeId {
        let mut node = Node::new(NodeKind::Var { pending: None });
        node.value = Some(val(value));
        node.set_at = self.stabilization_num + 1;
        self.insert_node(node)
    }

    /// Create a derived node computed from `parents` by `f`. This is the
    /// single "compute contract" every combinator plugs in through.
    pub fn compute<F>(&mut self, parents: &[NodeId], f: F) -> Result<NodeId>
    where
        F: Fn(&Inputs) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.check_known(parents)?;
        let node = Node::new(NodeKind::Compute { f: Arc::new(f) });
        let id = self.insert_node(node);
        self.link(id, parents)?;
        Ok(id)
    }

    /// Create a bind node: whenever one of the `lhs` inputs changes, `f`
    /// runs inside a fresh scope and returns the root of the replacement
    /// right-hand-side subgraph the bind delegates its value to.
    pub fn bind<F>(&mut self, lhs: &[NodeId], f: F) -> Result<NodeId>
    where
        F: Fn(&mut Graph, &Inputs) -> Result<NodeId, BoxError> + Send + Sync + 'static,
    {
        self.check_known(lhs)?;
        let id = NodeId::new();
        let state = BindState {
            f: Arc::new(f),
            lhs: SmallVec::from_slice(lhs),
            rhs_root: None,
            scope: Scope::bind(id),
            bound_at: 0,
        };
        let node = Node::with_id(id, NodeKind::Bind(state));
        let id = self.insert_node(node);
        self.link(id, lhs)?;
        Ok(id)
    }

    /// Install a cutoff predicate. `f(old, new)` returning `true` means "no
    /// significant change": the node keeps its previous value and its
    /// dependents are not scheduled. Values that fail to downcast to `T`
    /// never cut off.
    pub fn set_cutoff<T, F>(&mut self, id: NodeId, f: F) -> Result<()>
    where
        T: Any + Send + Sync,
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        let node = self.nodes.get_mut(&id).ok_or(Error::UnknownNode { id })?;
        node.cutoff = Some(Arc::new(move |old: &Value, new: &Value| {
            match (old.downcast_ref::<T>(), new.downcast_ref::<T>()) {
                (Some(old), Some(new)) => f(old, new),
                _ => false,
            }
        }));
        Ok(())
    }

    /// Mark a node as always stale: it recomputes every pass while observed.
    pub fn set_always_stale(&mut self, id: NodeId, always: bool) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(Error::UnknownNode { id })?;
        node.always_stale = always;
        Ok(())
    }

    /// Register an update handler, run after each pass in which the node's
    /// value changed. Handlers run in node-recompute arrival order, after
    /// the whole pass completes.
    pub fn on_update<F>(&mut self, id: NodeId, f: F) -> Result<()>
    where
        F: FnMut(&Value) + Send + 'static,
    {
        let node = self.nodes.get_mut(&id).ok_or(Error::UnknownNode { id })?;
        node.on_update.push(Box::new(f));
        Ok(())
    }

    /// Attach a label, surfaced through snapshots for external exporters.
    pub fn set_label(&mut self, id: NodeId, label: impl Into<String>) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(Error::UnknownNode { id })?;
        node.label = Some(label.into());
        Ok(())
    }

    fn insert_node(&mut self, mut node: Node) -> NodeId {
        let scope = self.scope_stack.last_mut().unwrap_or(&mut self.top_scope);
        node.created_in = scope.bind_node();
        scope.record(node.id);
        let id = node.id;
        trace!(node = ?id, kind = ?node.kind, "created node");
        self.nodes.insert(id, node);
        id
    }

    fn check_known(&self, ids: &[NodeId]) -> Result<()> {
        for &id in ids {
            if !self.nodes.contains_key(&id) {
                return Err(Error::UnknownNode { id });
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------

    /// Would adding the edge `parent -> child` create a cycle? Exposed for
    /// callers wiring edges outside `link` (dynamic fan-in nodes).
    pub fn would_create_cycle(&self, child: NodeId, parent: NodeId) -> bool {
        cycle::would_create_cycle(&self.nodes, child, parent)
    }

    /// Attach `parents` as inputs of `child`. Every edge is cycle-checked
    /// before anything is mutated, so a rejected link leaves the graph
    /// unmodified. If the child is attached, its height (and transitively
    /// its descendants') is repaired.
    pub fn link(&mut self, child: NodeId, parents: &[NodeId]) -> Result<()> {
        self.check_known(&[child])?;
        self.check_known(parents)?;
        for &parent in parents {
            if cycle::would_create_cycle(&self.nodes, child, parent) {
                return Err(Error::Cycle { child, parent });
            }
        }

        let child_observers: Vec<ObserverId> = self.nodes[&child].observers.keys().copied().collect();
        let mut added = Vec::new();
        for &parent in parents {
            if self.nodes[&child].parents.contains(&parent) {
                continue;
            }
            if let Some(c) = self.nodes.get_mut(&child) {
                c.parents.push(parent);
            }
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.push(child);
            }
            added.push(parent);
            trace!(child = ?child, parent = ?parent, "linked");
        }

        // A new dependency of a necessary node is itself necessary.
        for &parent in &added {
            for &obs in &child_observers {
                self.discover(parent, obs)?;
            }
        }

        if !added.is_empty() && self.nodes[&child].height != HEIGHT_UNSET {
            self.repair_heights_from(child)?;
        }
        Ok(())
    }

    /// Detach the edge `parent -> child`. If the parent stops being
    /// reachable from any observer it is released from the graph.
    pub fn unlink(&mut self, child: NodeId, parent: NodeId) -> Result<()> {
        self.check_known(&[child, parent])?;
        if !self.nodes[&child].parents.contains(&parent) {
            return Ok(());
        }
        if let Some(c) = self.nodes.get_mut(&child) {
            c.parents.retain(|p| *p != parent);
        }
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|c| *c != child);
        }
        trace!(child = ?child, parent = ?parent, "unlinked");

        let child_observers: Vec<ObserverId> = self.nodes[&child].observers.keys().copied().collect();
        for obs in child_observers {
            self.undiscover(parent, obs);
        }
        Ok(())
    }

    /// Drop scope-created nodes that nothing references anymore: no
    /// observers and no dependents. Called when a bind discards a scope, so
    /// subgraphs built per rebind do not accumulate in the arena. Walks the
    /// undo-log newest-first, letting removal of a dependent free its
    /// inputs in the same sweep. Nodes shared with the live graph keep a
    /// child or an observer and survive.
    pub(crate) fn sweep_scope(&mut self, created: &[NodeId]) {
        for &id in created.iter().rev() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if node.is_necessary() || !node.children.is_empty() {
                continue;
            }
            let parents = node.parents.clone();
            for parent in parents {
                if let Some(p) = self.nodes.get_mut(&parent) {
                    p.children.retain(|c| *c != id);
                }
            }
            self.observed.shift_remove(&id);
            self.heap.lock().remove(&id);
            self.nodes.shift_remove(&id);
            trace!(node = ?id, "swept from discarded scope");
        }
    }

    /// Push the height invariant repair from `child` through every
    /// descendant whose height it invalidates.
    fn repair_heights_from(&mut self, child: NodeId) -> Result<()> {
        let parents = self.nodes[&child].parents.clone();
        let Self {
            ref mut nodes,
            ref mut adjust,
            ref heap,
            ..
        } = *self;
        adjust.clear();
        for parent in parents {
            adjust.ensure_height_requirement(nodes, child, parent)?;
        }
        let mut heap = heap.lock();
        adjust.adjust_heights(nodes, &mut heap)
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Root an observer at `node`, keeping it (and everything it depends
    /// on) attached and eligible for recomputation.
    pub fn observe(&mut self, node: NodeId) -> Result<ObserverId> {
        self.check_known(&[node])?;
        let observer = Observer::new(node);
        let id = observer.id();
        self.observers.insert(id, observer);
        if let Err(e) = self.discover(node, id) {
            // Roll back the partial walk so a rejected observer leaves no
            // refcounts or heap entries behind.
            self.observers.shift_remove(&id);
            self.undiscover(node, id);
            return Err(e);
        }
        trace!(observer = ?id, node = ?node, "observing");
        Ok(id)
    }

    /// Drop an observer. Nodes no longer reachable from any observer are
    /// released.
    pub fn unobserve(&mut self, observer: ObserverId) {
        if let Some(obs) = self.observers.shift_remove(&observer) {
            self.undiscover(obs.node(), observer);
            trace!(observer = ?observer, node = ?obs.node(), "unobserved");
        }
    }

    /// Borrow an observer's record.
    pub fn observer(&self, id: ObserverId) -> Option<&Observer> {
        self.observers.get(&id)
    }

    /// Register `obs` on `id` and everything `id` depends on. Heights are
    /// assigned bottom-up as nodes become necessary; each newly necessary
    /// node is queued for its first recompute.
    ///
    /// The walk uses an explicit stack: a dependency chain can be far
    /// deeper than the height ceiling, and the ceiling check must fire
    /// before any stack limit does. `Enter` registers the observer and
    /// schedules the node's parents; `Assign` runs after them, so heights
    /// land bottom-up.
    pub(crate) fn discover(&mut self, id: NodeId, obs: ObserverId) -> Result<()> {
        enum Frame {
            Enter(NodeId),
            Assign(NodeId),
        }
        let mut stack = vec![Frame::Enter(id)];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(nid) => {
                    let Some(node) = self.nodes.get_mut(&nid) else {
                        continue;
                    };
                    let was_necessary = node.is_necessary();
                    let count = node.observers.entry(obs).or_insert(0);
                    *count += 1;
                    if *count > 1 {
                        // This observer already reaches the node through
                        // another dependent; its ancestors are covered.
                        continue;
                    }
                    if !was_necessary {
                        stack.push(Frame::Assign(nid));
                    }
                    for &parent in node.parents.iter() {
                        stack.push(Frame::Enter(parent));
                    }
                }
                Frame::Assign(nid) => {
                    let parents = match self.nodes.get(&nid) {
                        Some(node) => node.parents.clone(),
                        None => continue,
                    };
                    let height = parents
                        .iter()
                        .filter_map(|p| self.nodes.get(p))
                        .map(|p| p.height)
                        .max()
                        .map(|h| h + 1)
                        .unwrap_or(0);
                    if height > self.config.max_height {
                        return Err(Error::HeightLimitExceeded {
                            height,
                            max_height: self.config.max_height,
                        });
                    }
                    if let Some(node) = self.nodes.get_mut(&nid) {
                        node.height = height;
                    }
                    self.observed.insert(nid);
                    self.heap.lock().add(nid, height)?;
                    trace!(node = ?nid, height, "discovered");
                }
            }
        }
        Ok(())
    }

    /// Reverse of [`Graph::discover`]: drop one unit of `obs`-necessity
    /// from `id`; nodes whose accounting empties are released. Also the
    /// rollback for a discovery that hit the height ceiling, so nodes the
    /// walk never reached (no entry for `obs`) are skipped silently.
    pub(crate) fn undiscover(&mut self, id: NodeId, obs: ObserverId) {
        let mut stack = vec![id];
        while let Some(nid) = stack.pop() {
            let Some(node) = self.nodes.get_mut(&nid) else {
                continue;
            };
            let Some(count) = node.observers.get_mut(&obs) else {
                continue;
            };
            *count -= 1;
            if *count > 0 {
                continue;
            }
            node.observers.remove(&obs);
            let release = node.observers.is_empty();
            if release {
                node.height = HEIGHT_UNSET;
            }
            stack.extend(node.parents.iter().copied());
            if release {
                self.observed.shift_remove(&nid);
                self.heap.lock().remove(&nid);
                trace!(node = ?nid, "released");
            }
        }
    }

    // ------------------------------------------------------------------
    // Inputs
    // ------------------------------------------------------------------

    /// Write a variable. Outside a pass the node is queued immediately;
    /// during a pass the write is deferred to the next pass.
    pub fn set_var<T: Any + Send + Sync>(&mut self, id: NodeId, value: T) -> Result<()> {
        let stabilizing = self.status != Status::Idle;
        let set_at = self.stabilization_num + if stabilizing { 2 } else { 1 };
        let node = self.nodes.get_mut(&id).ok_or(Error::UnknownNode { id })?;
        match &mut node.kind {
            NodeKind::Var { pending } => *pending = Some(val(value)),
            _ => return Err(Error::NotAVariable { id }),
        }
        node.set_at = set_at;
        let height = node.height;
        self.schedule_set(id, height, stabilizing)
    }

    /// Force a node (and, transitively, its dependents once it recomputes
    /// and changes) into the recompute heap outside of a normal recompute.
    pub fn set_stale(&mut self, id: NodeId) -> Result<()> {
        let stabilizing = self.status != Status::Idle;
        let set_at = self.stabilization_num + if stabilizing { 2 } else { 1 };
        let node = self.nodes.get_mut(&id).ok_or(Error::UnknownNode { id })?;
        node.set_at = set_at;
        let height = node.height;
        self.schedule_set(id, height, stabilizing)
    }

    fn schedule_set(&mut self, id: NodeId, height: i32, stabilizing: bool) -> Result<()> {
        if stabilizing {
            warn!(node = ?id, "input mutated during stabilization; queued for the next pass");
            self.set_during_stabilization.lock().push(id);
        } else if self.observed.contains(&id) {
            self.heap.lock().add(id, height)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Read a node's current value, downcast to `T`.
    pub fn value<T>(&self, id: NodeId) -> Option<T>
    where
        T: Any + Send + Sync + Clone,
    {
        self.nodes.get(&id)?.value.as_ref()?.downcast_ref::<T>().cloned()
    }

    /// Read a node's current value without downcasting.
    pub fn value_arc(&self, id: NodeId) -> Option<Value> {
        self.nodes.get(&id)?.value.clone()
    }

    /// Snapshot the values of `parents`, in order, for a compute hook.
    pub(crate) fn gather_inputs(&self, parents: &[NodeId]) -> Inputs {
        Inputs::new(
            parents
                .iter()
                .map(|p| self.nodes.get(p).and_then(|n| n.value.clone()))
                .collect(),
        )
    }

    pub(crate) fn push_scope(&mut self, scope: Scope) {
        self.scope_stack.push(scope);
    }

    pub(crate) fn pop_scope(&mut self) -> Scope {
        self.scope_stack.pop().unwrap_or_else(Scope::top)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(inputs: &Inputs) -> Result<Value, BoxError> {
        let a = inputs.require::<i64>(0)?;
        let b = inputs.require::<i64>(1)?;
        Ok(val(a + b))
    }

    #[test]
    fn observe_assigns_heights_bottom_up() {
        let mut g = Graph::new();
        let a = g.var(1_i64);
        let b = g.var(2_i64);
        let sum = g.compute(&[a, b], add).unwrap();
        let doubled = g
            .compute(&[sum], |i| Ok(val(i.require::<i64>(0)? * 2)))
            .unwrap();

        // Nothing is attached until observed.
        assert_eq!(g.node(sum).unwrap().height(), HEIGHT_UNSET);

        g.observe(doubled).unwrap();
        assert_eq!(g.node(a).unwrap().height(), 0);
        assert_eq!(g.node(b).unwrap().height(), 0);
        assert_eq!(g.node(sum).unwrap().height(), 1);
        assert_eq!(g.node(doubled).unwrap().height(), 2);
        assert_eq!(g.observed_count(), 4);
    }

    #[test]
    fn cycle_rejection_leaves_graph_unmodified() {
        let mut g = Graph::new();
        let a = g.var(0_i64);
        let b = g.compute(&[a], |i| Ok(val(*i.require::<i64>(0)?))).unwrap();
        let c = g.compute(&[b], |i| Ok(val(*i.require::<i64>(0)?))).unwrap();

        let before_parents = g.node(a).unwrap().parents.clone();
        let err = g.link(a, &[c]).unwrap_err();
        assert!(matches!(err, Error::Cycle { .. }));
        assert_eq!(g.node(a).unwrap().parents, before_parents);
        assert!(g.node(c).unwrap().children.is_empty());
    }

    #[test]
    fn unknown_nodes_are_rejected() {
        let mut g = Graph::new();
        let ghost = NodeId::new();
        assert!(matches!(
            g.observe(ghost),
            Err(Error::UnknownNode { id }) if id == ghost
        ));
        assert!(matches!(g.set_stale(ghost), Err(Error::UnknownNode { .. })));
    }

    #[test]
    fn set_var_rejects_non_variables() {
        let mut g = Graph::new();
        let a = g.var(0_i64);
        let b = g.compute(&[a], |i| Ok(val(*i.require::<i64>(0)?))).unwrap();
        assert!(matches!(
            g.set_var(b, 1_i64),
            Err(Error::NotAVariable { .. })
        ));
    }

    #[test]
    fn unobserve_releases_the_chain() {
        let mut g = Graph::new();
        let a = g.var(1_i64);
        let b = g.compute(&[a], |i| Ok(val(*i.require::<i64>(0)?))).unwrap();

        let obs = g.observe(b).unwrap();
        assert!(g.is_observed(a));
        assert!(g.is_observed(b));

        g.unobserve(obs);
        assert!(!g.is_observed(a));
        assert!(!g.is_observed(b));
        assert_eq!(g.node(a).unwrap().height(), HEIGHT_UNSET);
        assert!(g.heap.lock().is_empty());
    }

    #[test]
    fn diamond_survives_partial_unlink() {
        // a feeds both b and c; d reads b and c. Unlinking d -> b must keep
        // a observed (still reachable through c).
        let mut g = Graph::new();
        let a = g.var(1_i64);
        let b = g.compute(&[a], |i| Ok(val(*i.require::<i64>(0)?))).unwrap();
        let c = g.compute(&[a], |i| Ok(val(*i.require::<i64>(0)?))).unwrap();
        let d = g.compute(&[b, c], add).unwrap();

        g.observe(d).unwrap();
        g.unlink(d, b).unwrap();

        assert!(!g.is_observed(b));
        assert!(g.is_observed(a));
        assert!(g.is_observed(c));
    }

    #[test]
    fn linking_under_an_observed_child_discovers_the_parent() {
        let mut g = Graph::new();
        let a = g.var(1_i64);
        let sink = g
            .compute(&[a], |i| Ok(val(*i.require::<i64>(0)?)))
            .unwrap();
        g.observe(sink).unwrap();

        let late = g.var(5_i64);
        assert!(!g.is_observed(late));
        g.link(sink, &[late]).unwrap();
        assert!(g.is_observed(late));
        assert!(g.node(late).unwrap().height() < g.node(sink).unwrap().height());
    }
}

//! Stabilization
//!
//! A stabilization pass drains the recompute heap in ascending height order
//! until the graph is consistent with its inputs. Because every edge keeps
//! `height(parent) < height(child)`, a node's inputs have always settled by
//! the time it pops, and each node recomputes at most once per pass (binds
//! that splice in a fresh subgraph defer and pop a second time to adopt its
//! value, without rerunning their hook).
//!
//! Two drivers share the pass skeleton:
//!
//! * [`Graph::stabilize`] pops one node at a time on the calling thread.
//! * [`Graph::parallel_stabilize`] takes the whole minimum bucket at once
//!   and fans pure compute nodes out over a scoped worker pool. Nodes at
//!   one height are mutually independent, so a bucket is a safe unit of
//!   parallelism; each drained bucket is a synchronization barrier.
//!
//! Variables and binds always run on the driving thread in both modes: they
//! mutate graph structure, which workers never touch. Workers only evaluate
//! pure hooks against value snapshots.
//!
//! # Pass bookkeeping
//!
//! Update handlers never run mid-pass; nodes whose value changed are
//! collected and their handlers run after the heap drains, while the graph
//! reads as consistent. Inputs written during a pass (from bind hooks) are
//! deferred and queued for the next pass. Always-stale nodes seen during
//! the pass are re-queued at pass end.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::error::{BoxError, Error, Result};
use crate::graph::bind::BindValue;
use crate::graph::node::{ComputeFn, Inputs, NodeKind, Value};
use crate::graph::{Graph, Status};
use crate::ident::NodeId;

/// Cooperative cancellation handle for a stabilization pass.
///
/// Cheap to clone; cancelling from any thread makes the pass return
/// [`Error::Cancelled`] at its next checkpoint. Work already committed
/// stays committed, and the heap keeps whatever was still queued, so a
/// later pass resumes where the cancelled one stopped.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once [`CancelToken::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One pure compute evaluation handed to a worker: the hook plus a snapshot
/// of its input values. Carries no graph references, so workers never race
/// the driver on structure.
struct Job {
    id: NodeId,
    f: ComputeFn,
    inputs: Inputs,
}

/// What recomputing one node amounts to, extracted under the node borrow so
/// the hook can run against `&mut Graph`.
enum Plan {
    Value(Option<Value>),
    Compute(ComputeFn, SmallVec<[NodeId; 2]>),
    Bind,
}

impl Graph {
    /// Run one sequential stabilization pass to completion.
    pub fn stabilize(&mut self) -> Result<()> {
        self.stabilize_with(&CancelToken::new())
    }

    /// Sequential pass with cooperative cancellation.
    pub fn stabilize_with(&mut self, cancel: &CancelToken) -> Result<()> {
        self.begin_pass()?;
        let result = self.run_sequential(cancel);
        self.finish_pass(result)
    }

    /// Run one stabilization pass, recomputing each height bucket's pure
    /// compute nodes on a worker pool.
    pub fn parallel_stabilize(&mut self) -> Result<()> {
        self.parallel_stabilize_with(&CancelToken::new())
    }

    /// Parallel pass with cooperative cancellation.
    pub fn parallel_stabilize_with(&mut self, cancel: &CancelToken) -> Result<()> {
        self.begin_pass()?;
        let result = self.run_parallel(cancel);
        self.finish_pass(result)
    }

    fn begin_pass(&mut self) -> Result<()> {
        if self.status != Status::Idle {
            return Err(Error::AlreadyStabilizing);
        }
        self.status = Status::Stabilizing;
        self.always_stale_seen.clear();
        Ok(())
    }

    /// Close out a pass whatever its outcome: re-queue always-stale nodes,
    /// run deferred update handlers, bump the pass counter, and replay
    /// inputs written during the pass.
    fn finish_pass(&mut self, result: Result<()>) -> Result<()> {
        let mut outcome = result;

        let stale = std::mem::take(&mut self.always_stale_seen);
        {
            let mut heap = self.heap.lock();
            for id in stale {
                if let Some(node) = self.nodes.get(&id) {
                    if node.is_necessary() {
                        if let Err(e) = heap.add(id, node.height) {
                            if outcome.is_ok() {
                                outcome = Err(e);
                            }
                        }
                    }
                }
            }
        }

        self.status = Status::RunningUpdateHandlers;
        let pending = std::mem::take(&mut self.pending_updates);
        for id in pending {
            let (value, mut handlers) = match self.nodes.get_mut(&id) {
                Some(node) => match node.value.clone() {
                    Some(value) => (value, std::mem::take(&mut node.on_update)),
                    None => continue,
                },
                None => continue,
            };
            for handler in handlers.iter_mut() {
                handler(&value);
            }
            if let Some(node) = self.nodes.get_mut(&id) {
                handlers.extend(std::mem::take(&mut node.on_update));
                node.on_update = handlers;
            }
        }

        self.stabilization_num += 1;
        self.status = Status::Idle;

        // Inputs written while the pass ran become next pass's work.
        let written = std::mem::take(&mut *self.set_during_stabilization.lock());
        {
            let mut heap = self.heap.lock();
            for id in written {
                if let Some(node) = self.nodes.get(&id) {
                    if node.is_necessary() {
                        if let Err(e) = heap.add(id, node.height) {
                            if outcome.is_ok() {
                                outcome = Err(e);
                            }
                        }
                    }
                }
            }
        }

        debug!(
            pass = self.stabilization_num,
            recomputes = self.recompute_count,
            still_queued = self.heap.lock().len(),
            ok = outcome.is_ok(),
            "stabilization pass finished"
        );
        outcome
    }

    fn run_sequential(&mut self, cancel: &CancelToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let next = self.heap.lock().remove_min();
            match next {
                Some(id) => self.recompute_node(id)?,
                None => return Ok(()),
            }
        }
    }

    fn run_parallel(&mut self, cancel: &CancelToken) -> Result<()> {
        let workers = if self.config.parallelism == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.config.parallelism
        };
        let pass = self.stabilization_num + 1;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let level = self.heap.lock().remove_min_height();
            if level.is_empty() {
                return Ok(());
            }

            let mut jobs = Vec::new();
            let mut structural = Vec::new();
            for id in level {
                let Some(node) = self.nodes.get(&id) else {
                    continue;
                };
                if !node.is_necessary() {
                    continue;
                }
                match &node.kind {
                    NodeKind::Compute { f } => {
                        if node.always_stale {
                            self.always_stale_seen.push(id);
                        }
                        jobs.push(Job {
                            id,
                            f: f.clone(),
                            inputs: self.gather_inputs(&node.parents),
                        });
                    }
                    // Vars and binds mutate the graph; they stay on the
                    // driving thread.
                    NodeKind::Var { .. } | NodeKind::Bind(_) => structural.push(id),
                }
            }

            let mut unfinished: HashSet<NodeId> = jobs.iter().map(|j| j.id).collect();
            let mut first_err = None;
            for (id, result) in run_level(jobs, workers, cancel) {
                unfinished.remove(&id);
                match result {
                    Ok(value) => self.commit(id, Some(value), pass)?,
                    Err(source) => {
                        if first_err.is_none() {
                            first_err = Some(Error::Compute { node: id, source });
                        }
                    }
                }
            }
            // Successful siblings are committed before the pass fails, so a
            // retry does not redo their work.
            if let Some(err) = first_err {
                return Err(err);
            }

            if cancel.is_cancelled() {
                // The level was already popped; put back everything that
                // never ran so a later pass picks it up.
                let mut heap = self.heap.lock();
                for id in unfinished.into_iter().chain(structural) {
                    if let Some(node) = self.nodes.get(&id) {
                        heap.add(id, node.height)?;
                    }
                }
                return Err(Error::Cancelled);
            }

            for id in structural {
                self.recompute_node(id)?;
            }
        }
    }

    /// Recompute one node on the driving thread.
    pub(crate) fn recompute_node(&mut self, id: NodeId) -> Result<()> {
        let pass = self.stabilization_num + 1;
        let plan = {
            let Some(node) = self.nodes.get_mut(&id) else {
                return Ok(());
            };
            // Released while queued in the same batch (a rebind can do
            // this); nothing to do.
            if !node.is_necessary() {
                return Ok(());
            }
            if node.always_stale {
                self.always_stale_seen.push(id);
            }
            let Some(node) = self.nodes.get_mut(&id) else {
                return Ok(());
            };
            match &mut node.kind {
                NodeKind::Var { pending } => {
                    // A write stamped for a later pass stays pending; this
                    // recompute was triggered by something else (discovery,
                    // set_stale) and must not adopt it early.
                    let taken = if node.set_at <= pass {
                        pending.take()
                    } else {
                        None
                    };
                    Plan::Value(taken.or_else(|| node.value.clone()))
                }
                NodeKind::Compute { f } => Plan::Compute(f.clone(), node.parents.clone()),
                NodeKind::Bind(_) => Plan::Bind,
            }
        };

        match plan {
            Plan::Value(candidate) => self.commit(id, candidate, pass),
            Plan::Compute(f, parents) => {
                let inputs = self.gather_inputs(&parents);
                let value =
                    f(&inputs).map_err(|e| Error::Compute { node: id, source: e })?;
                self.commit(id, Some(value), pass)
            }
            Plan::Bind => match self.recompute_bind(id, pass)? {
                BindValue::Ready(value) => self.commit(id, Some(value), pass),
                BindValue::Deferred => {
                    // The freshly bound subgraph sits below this node's
                    // repaired height; pop again once it has settled.
                    let height = self.nodes[&id].height;
                    trace!(node = ?id, height, "bind deferred until its subgraph settles");
                    self.heap.lock().add(id, height)
                }
            },
        }
    }

    /// Accept a recomputed value: apply the cutoff, store, and schedule the
    /// node's necessary dependents.
    pub(crate) fn commit(&mut self, id: NodeId, candidate: Option<Value>, pass: u64) -> Result<()> {
        self.recompute_count += 1;
        let Some(node) = self.nodes.get_mut(&id) else {
            return Ok(());
        };
        node.recomputed_at = pass;
        let Some(candidate) = candidate else {
            return Ok(());
        };

        if let (Some(old), Some(cutoff)) = (&node.value, &node.cutoff) {
            if cutoff(old, &candidate) {
                // No significant change: keep the stored value (the last one
                // that propagated) and leave dependents alone.
                trace!(node = ?id, "cutoff suppressed propagation");
                return Ok(());
            }
        }

        node.value = Some(candidate);
        node.changed_at = pass;
        let has_handlers = !node.on_update.is_empty();
        let children = node.children.clone();

        if has_handlers {
            self.pending_updates.push(id);
        }
        let mut heap = self.heap.lock();
        for child in children {
            if let Some(child_node) = self.nodes.get(&child) {
                if child_node.is_necessary() {
                    heap.add(child, child_node.height)?;
                }
            }
        }
        Ok(())
    }
}

/// Evaluate a bucket's compute jobs, fanning out over `workers` scoped
/// threads when the bucket is big enough to be worth it. Jobs are claimed
/// through a shared index; results arrive in completion order.
fn run_level(
    jobs: Vec<Job>,
    workers: usize,
    cancel: &CancelToken,
) -> Vec<(NodeId, std::result::Result<Value, BoxError>)> {
    if jobs.len() <= 1 || workers <= 1 {
        return jobs
            .into_iter()
            .map(|job| {
                let result = (job.f)(&job.inputs);
                (job.id, result)
            })
            .collect();
    }

    let next = AtomicUsize::new(0);
    let results = Mutex::new(Vec::with_capacity(jobs.len()));
    let workers = workers.min(jobs.len());
    std::thread::scope(|s| {
        for _ in 0..workers {
            s.spawn(|| loop {
                if cancel.is_cancelled() {
                    return;
                }
                let i = next.fetch_add(1, Ordering::Relaxed);
                let Some(job) = jobs.get(i) else {
                    return;
                };
                let result = (job.f)(&job.inputs);
                results.lock().push((job.id, result));
            });
        }
    });
    results.into_inner()
}

//! Strata Core
//!
//! This crate provides a height-stratified incremental computation engine.
//! It implements:
//!
//! - A dependency graph of variables, derived computations, and binds
//! - Demand-driven recomputation rooted at observers
//! - Dynamic graph restructuring with height repair and cycle rejection
//! - Sequential and level-parallel stabilization drivers
//!
//! Nodes are ordered by *height*, an upper bound on the longest dependency
//! chain ending at each node. A stabilization pass drains dirty nodes in
//! ascending height order, so every node sees fully settled inputs and
//! recomputes at most once per pass. Nodes at equal height are mutually
//! independent, which is what makes whole-bucket parallel recomputation
//! safe.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: The node arena, recompute heap, observer accounting, bind
//!   machinery, and the stabilization drivers
//! - `containers`: The keyed linked list backing the heap's buckets
//! - `snapshot`: Serializable views of graph structure for tooling
//! - `error`: The error taxonomy shared across the crate
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_core::{Graph, val};
//!
//! let mut graph = Graph::new();
//!
//! // Two inputs and a derived sum.
//! let a = graph.var(1_i64);
//! let b = graph.var(2_i64);
//! let total = graph.compute(&[a, b], |inputs| {
//!     Ok(val(inputs.require::<i64>(0)? + inputs.require::<i64>(1)?))
//! })?;
//!
//! // Nothing recomputes until it is observed.
//! graph.observe(total)?;
//! graph.stabilize()?;
//! assert_eq!(graph.value::<i64>(total), Some(3));
//!
//! // Only the dirty path recomputes.
//! graph.set_var(a, 10_i64)?;
//! graph.stabilize()?;
//! assert_eq!(graph.value::<i64>(total), Some(12));
//! ```

pub mod containers;
pub mod error;
pub mod graph;
pub mod ident;
pub mod snapshot;

pub use error::{BoxError, Error, Result};
pub use graph::{
    val, CancelToken, Graph, GraphConfig, Inputs, Node, Observer, Scope, Status, Value,
    HEIGHT_UNSET,
};
pub use ident::{GraphId, NodeId, ObserverId};
pub use snapshot::{GraphSnapshot, NodeSnapshot};

//! Error Taxonomy
//!
//! Every error the engine produces is scoped to a single operation or a
//! single stabilization pass; the graph remains usable afterwards. Structural
//! errors (cycles, the height ceiling) are returned synchronously from the
//! mutating call. User compute errors are wrapped in [`Error::Compute`] and
//! abort the current pass without rolling back recomputations that already
//! committed earlier in the pass.

use thiserror::Error;

use crate::ident::NodeId;

/// Opaque error type returned by user-supplied compute and bind functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by the incremental engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Adding the edge would create a cycle. The edge was not added and the
    /// graph is unmodified.
    #[error("adding edge {parent} -> {child} would create a cycle")]
    Cycle { child: NodeId, parent: NodeId },

    /// A node's height grew past the configured ceiling.
    #[error("node height {height} exceeds the configured maximum of {max_height}")]
    HeightLimitExceeded { height: i32, max_height: i32 },

    /// A stabilization pass is already in progress on this graph.
    #[error("stabilization is already in progress")]
    AlreadyStabilizing,

    /// Stabilization was cancelled between nodes or height levels.
    #[error("stabilization was cancelled")]
    Cancelled,

    /// A user-supplied compute or bind function failed.
    #[error("node {node} failed to recompute")]
    Compute {
        node: NodeId,
        #[source]
        source: BoxError,
    },

    /// An operation named a node this graph does not hold.
    #[error("unknown node {id}")]
    UnknownNode { id: NodeId },

    /// `set_var` was called on a node that is not a variable.
    #[error("node {id} is not a variable")]
    NotAVariable { id: NodeId },
}

/// Convenience alias used throughout the engine.
pub type Result<T, E = Error> = std::result::Result<T, E>;

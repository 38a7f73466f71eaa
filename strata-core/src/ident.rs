//! Identifiers
//!
//! Every node, observer, and graph is named by a collision-resistant random
//! 128-bit identifier. Random identifiers (rather than a shared counter) keep
//! node construction free of cross-graph coordination: two graphs in the same
//! process can mint ids concurrently without ever colliding in practice.
//!
//! Identifiers are `Copy`, totally ordered (for deterministic iteration of
//! id-keyed collections), and display as 32-digit lowercase hex.

use std::fmt;

use serde::{Serialize, Serializer};

/// Unique identifier for a node in the dependency graph.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u128);

/// Unique identifier for an observer rooted at a node.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(u128);

/// Unique identifier for a graph instance.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GraphId(u128);

macro_rules! ident_impls {
    ($name:ident) => {
        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(rand::random())
            }

            /// Get the raw 128-bit value.
            pub fn raw(&self) -> u128 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:032x}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Short prefix is enough to tell nodes apart in logs.
                write!(f, concat!(stringify!($name), "({:08x})"), self.0 >> 96)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }
    };
}

ident_impls!(NodeId);
ident_impls!(ObserverId);
ident_impls!(GraphId);

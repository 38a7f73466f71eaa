//! Container Primitives
//!
//! The scheduling heaps are built on a hybrid container that no standard
//! collection provides: a doubly linked list that is simultaneously keyed by
//! identifier, giving O(1) membership tests and O(1) removal by key while
//! preserving insertion order.

mod keyed_list;

pub use keyed_list::KeyedList;

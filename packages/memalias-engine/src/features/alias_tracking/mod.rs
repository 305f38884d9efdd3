//! Binding & Alias Tracker
//!
//! References and pointers to stack and heap storage, the binding-time and
//! immutability rules for references, and invalidation when a referent is
//! destroyed.

pub mod graph;
pub mod tracker;

pub use graph::{AliasEdge, AliasGraph, AliasNode};
pub use tracker::AliasTracker;

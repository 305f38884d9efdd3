//! Allocation Manager
//!
//! Scalar and array heap allocation and release, the free-once and
//! free-kind-matching rules, and leak detection at termination.

pub mod manager;

pub use manager::{AllocationManager, ReleaseOutcome};

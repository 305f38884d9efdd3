//! Feature modules, leaves first
//!
//! - memory_space    - stack frames, bindings and heap records
//! - allocation      - heap allocation/release rules and leak detection
//! - alias_tracking  - references, pointers and dangling detection
//! - call_return     - parameter passing, returns and overload selection
//! - diagnostics     - violation taxonomy and reporting

pub mod alias_tracking;
pub mod allocation;
pub mod call_return;
pub mod diagnostics;
pub mod memory_space;

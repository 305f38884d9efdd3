//! Pipeline orchestration

pub mod engine;
pub mod operation;

pub use engine::Engine;
pub use operation::{Operation, OperationOutcome, Trace};

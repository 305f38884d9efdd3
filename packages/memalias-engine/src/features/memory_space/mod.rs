//! Memory Space
//!
//! Owns the stack-frame stack and the heap object table. Records live in
//! arenas indexed by their ids; destroying a frame is a validity flag flip.

pub mod domain;
pub mod space;

pub use domain::{
    Binding, BindingTag, HeapObject, HeapShape, ReleaseKind, Resolved, StackFrame, Validity,
};
pub use space::MemorySpace;

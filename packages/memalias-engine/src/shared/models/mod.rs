//! Shared models

mod ids;
mod types;
mod value;

pub use ids::{BindingId, CallId, EntityRef, FrameId, HeapObjectId};
pub use types::{DeclaredType, ForbiddenKind, StorageClass, TypeKind};
pub use value::{Address, Operand, Value};

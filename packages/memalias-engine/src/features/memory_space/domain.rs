//! Memory Space Domain - frames, bindings and heap records

use crate::shared::models::{
    Address, BindingId, DeclaredType, FrameId, HeapObjectId, StorageClass, TypeKind, Value,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifetime state of a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Validity {
    Live,
    /// Still addressable, content valid but unspecified
    MovedOut,
    /// Owning frame was popped
    Destroyed,
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validity::Live => write!(f, "live"),
            Validity::MovedOut => write!(f, "moved-out"),
            Validity::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Annotation attached to a binding at declaration time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindingTag {
    /// Declared without an initializer
    Indeterminate,
    /// Declared as a reference to a reference and collapsed
    ReferenceCollapse,
}

/// Named storage location inside a stack frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub id: BindingId,
    pub name: String,
    pub frame: FrameId,
    pub declared_type: DeclaredType,
    pub class: StorageClass,
    pub validity: Validity,
    /// Owned data for value bindings, the address for pointer bindings.
    /// Always `Indeterminate` for references.
    pub content: Value,
    /// Referent of a reference binding, fixed at creation
    pub alias_target: Option<Address>,
    pub tags: Vec<BindingTag>,
}

impl Binding {
    pub fn is_destroyed(&self) -> bool {
        self.validity == Validity::Destroyed
    }

    pub fn is_reference(&self) -> bool {
        self.class == StorageClass::Reference
    }

    pub fn is_pointer(&self) -> bool {
        self.class == StorageClass::Pointer
    }

    pub fn has_tag(&self, tag: BindingTag) -> bool {
        self.tags.contains(&tag)
    }
}

/// One activation record; bindings in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub id: FrameId,
    pub label: String,
    pub bindings: Vec<BindingId>,
    pub popped: bool,
}

/// Element layout of a heap allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeapShape {
    Scalar,
    Array(usize),
}

/// Which release operation was used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseKind {
    Scalar,
    Array,
}

impl fmt::Display for ReleaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseKind::Scalar => write!(f, "scalar release"),
            ReleaseKind::Array => write!(f, "array release"),
        }
    }
}

/// Heap allocation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeapObject {
    pub id: HeapObjectId,
    pub element_kind: TypeKind,
    pub shape: HeapShape,
    /// Scalar content; arrays are tracked as a whole
    pub contents: Value,
    /// Operation index of the allocation event
    pub allocated_at: usize,
    /// Operation index of the single successful release, if any
    pub released_at: Option<usize>,
}

impl HeapObject {
    pub fn is_live(&self) -> bool {
        self.released_at.is_none()
    }

    /// The release operation that matches this allocation
    pub fn matching_release(&self) -> ReleaseKind {
        match self.shape {
            HeapShape::Scalar => ReleaseKind::Scalar,
            HeapShape::Array(_) => ReleaseKind::Array,
        }
    }
}

/// Result of resolving an address
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<'a> {
    Binding(&'a Binding),
    HeapObject(&'a HeapObject),
    /// Null, or an id this space never handed out
    Invalid,
}

impl Resolved<'_> {
    /// Whether the storage behind the address can still be accessed
    pub fn is_accessible(&self) -> bool {
        match self {
            Resolved::Binding(binding) => !binding.is_destroyed(),
            Resolved::HeapObject(object) => object.is_live(),
            Resolved::Invalid => false,
        }
    }
}

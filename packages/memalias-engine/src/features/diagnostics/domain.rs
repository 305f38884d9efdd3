//! Diagnostics Domain - violation taxonomy and diagnostic records

use crate::shared::models::EntityRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every rule violation the engine can classify
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ViolationKind {
    /// Release of an already released heap object
    DoubleFree,
    /// Scalar release of an array allocation, or array release of a scalar one
    MismatchedRelease,
    /// Release of storage that was never heap-allocated
    InvalidFree,
    /// Heap object still live at termination
    Leak,
    /// Reference declared without a target
    UnboundReference,
    /// Reference bound to something that is not addressable storage
    InvalidReferenceSource,
    PointerToReferenceForbidden,
    ArrayOfReferencesForbidden,
    /// Access through a pointer/reference whose target is destroyed
    DanglingAccess,
    /// Pointer/reference return into the frame being popped
    DanglingReturn,
    OverloadAmbiguous,
    NoMatchingOverload,
    /// Dereference of a null pointer
    NullDereference,
    /// Read of never-written storage (policy-gated)
    IndeterminateRead,
}

impl ViolationKind {
    pub const ALL: [ViolationKind; 14] = [
        ViolationKind::DoubleFree,
        ViolationKind::MismatchedRelease,
        ViolationKind::InvalidFree,
        ViolationKind::Leak,
        ViolationKind::UnboundReference,
        ViolationKind::InvalidReferenceSource,
        ViolationKind::PointerToReferenceForbidden,
        ViolationKind::ArrayOfReferencesForbidden,
        ViolationKind::DanglingAccess,
        ViolationKind::DanglingReturn,
        ViolationKind::OverloadAmbiguous,
        ViolationKind::NoMatchingOverload,
        ViolationKind::NullDereference,
        ViolationKind::IndeterminateRead,
    ];

    pub fn default_severity(&self) -> Severity {
        match self {
            ViolationKind::DoubleFree
            | ViolationKind::InvalidFree
            | ViolationKind::DanglingAccess
            | ViolationKind::DanglingReturn
            | ViolationKind::NullDereference => Severity::Critical,
            ViolationKind::MismatchedRelease
            | ViolationKind::UnboundReference
            | ViolationKind::InvalidReferenceSource
            | ViolationKind::PointerToReferenceForbidden
            | ViolationKind::ArrayOfReferencesForbidden
            | ViolationKind::OverloadAmbiguous
            | ViolationKind::NoMatchingOverload => Severity::Error,
            ViolationKind::Leak | ViolationKind::IndeterminateRead => Severity::Warning,
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViolationKind::DoubleFree => "double free",
            ViolationKind::MismatchedRelease => "mismatched release",
            ViolationKind::InvalidFree => "invalid free",
            ViolationKind::Leak => "leak",
            ViolationKind::UnboundReference => "unbound reference",
            ViolationKind::InvalidReferenceSource => "invalid reference source",
            ViolationKind::PointerToReferenceForbidden => "pointer to reference",
            ViolationKind::ArrayOfReferencesForbidden => "array of references",
            ViolationKind::DanglingAccess => "dangling access",
            ViolationKind::DanglingReturn => "dangling return",
            ViolationKind::OverloadAmbiguous => "ambiguous overload",
            ViolationKind::NoMatchingOverload => "no matching overload",
            ViolationKind::NullDereference => "null dereference",
            ViolationKind::IndeterminateRead => "indeterminate read",
        };
        write!(f, "{}", name)
    }
}

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// One classified violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub violation_kind: ViolationKind,
    pub severity: Severity,
    /// Index of the operation that caused it, in feed order
    pub operation_index: usize,
    pub involved_ids: Vec<EntityRef>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        violation_kind: ViolationKind,
        operation_index: usize,
        involved_ids: Vec<EntityRef>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            violation_kind,
            severity: violation_kind.default_severity(),
            operation_index,
            involved_ids,
            message: message.into(),
        }
    }

    pub fn involves(&self, entity: impl Into<EntityRef>) -> bool {
        let entity = entity.into();
        self.involved_ids.contains(&entity)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[op {}] {} ({}): {}",
            self.operation_index, self.violation_kind, self.severity, self.message
        )
    }
}

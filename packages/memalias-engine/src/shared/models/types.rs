//! Kind vocabulary: scalar kinds and declared storage types
//!
//! `DeclaredType` is plain data so that storage kinds a real compiler would
//! reject outright (pointer-to-reference, array-of-references) can still be
//! described, fed to the engine and reported.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a value as seen by overload matching and heap element records
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Int,
    Bool,
    Char,
    Double,
    String,
    /// User-defined aggregate, compared by name
    Named(String),
    /// Pointer to the inner kind
    Pointer(Box<TypeKind>),
}

impl TypeKind {
    pub fn pointer_to(inner: TypeKind) -> Self {
        TypeKind::Pointer(Box::new(inner))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, TypeKind::Pointer(_))
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Int => write!(f, "int"),
            TypeKind::Bool => write!(f, "bool"),
            TypeKind::Char => write!(f, "char"),
            TypeKind::Double => write!(f, "double"),
            TypeKind::String => write!(f, "string"),
            TypeKind::Named(name) => write!(f, "{}", name),
            TypeKind::Pointer(inner) => write!(f, "{}*", inner),
        }
    }
}

/// How a binding holds its storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageClass {
    /// Owns its contained data (scalars and stack arrays)
    Value,
    /// Holds an address that may be reassigned, null or dangling
    Pointer,
    /// Permanent alias of exactly one other location
    Reference,
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageClass::Value => write!(f, "value"),
            StorageClass::Pointer => write!(f, "pointer"),
            StorageClass::Reference => write!(f, "reference"),
        }
    }
}

/// Declared storage type of a binding
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclaredType {
    Scalar(TypeKind),
    Pointer(Box<DeclaredType>),
    Reference(Box<DeclaredType>),
    Array(Box<DeclaredType>, usize),
}

/// Storage kind that can never be declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForbiddenKind {
    PointerToReference,
    ArrayOfReferences,
}

impl DeclaredType {
    pub fn scalar(kind: TypeKind) -> Self {
        DeclaredType::Scalar(kind)
    }

    pub fn pointer_to(inner: DeclaredType) -> Self {
        DeclaredType::Pointer(Box::new(inner))
    }

    pub fn reference_to(inner: DeclaredType) -> Self {
        DeclaredType::Reference(Box::new(inner))
    }

    pub fn array_of(inner: DeclaredType, count: usize) -> Self {
        DeclaredType::Array(Box::new(inner), count)
    }

    /// Storage class of the outermost type constructor
    pub fn storage_class(&self) -> StorageClass {
        match self {
            DeclaredType::Pointer(_) => StorageClass::Pointer,
            DeclaredType::Reference(_) => StorageClass::Reference,
            DeclaredType::Scalar(_) | DeclaredType::Array(..) => StorageClass::Value,
        }
    }

    /// First forbidden construct anywhere in the type, outermost first
    pub fn find_forbidden(&self) -> Option<ForbiddenKind> {
        match self {
            DeclaredType::Scalar(_) => None,
            DeclaredType::Pointer(inner) => match inner.as_ref() {
                DeclaredType::Reference(_) => Some(ForbiddenKind::PointerToReference),
                other => other.find_forbidden(),
            },
            DeclaredType::Array(inner, _) => match inner.as_ref() {
                DeclaredType::Reference(_) => Some(ForbiddenKind::ArrayOfReferences),
                other => other.find_forbidden(),
            },
            DeclaredType::Reference(inner) => inner.find_forbidden(),
        }
    }

    /// Collapse `T& &` chains to `T&`.
    ///
    /// Returns the collapsed type and whether any collapsing happened.
    pub fn collapse_references(&self) -> (DeclaredType, bool) {
        let mut current = self;
        let mut collapsed = false;
        while let DeclaredType::Reference(inner) = current {
            if let DeclaredType::Reference(_) = inner.as_ref() {
                current = inner.as_ref();
                collapsed = true;
            } else {
                break;
            }
        }
        (current.clone(), collapsed)
    }

    /// Kind used when a binding of this type is passed as a call argument
    pub fn value_kind(&self) -> Option<TypeKind> {
        match self {
            DeclaredType::Scalar(kind) => Some(kind.clone()),
            DeclaredType::Pointer(inner) => inner.value_kind().map(TypeKind::pointer_to),
            DeclaredType::Reference(inner) => inner.value_kind(),
            DeclaredType::Array(..) => None,
        }
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclaredType::Scalar(kind) => write!(f, "{}", kind),
            DeclaredType::Pointer(inner) => write!(f, "{}*", inner),
            DeclaredType::Reference(inner) => write!(f, "{}&", inner),
            DeclaredType::Array(inner, count) => write!(f, "{}[{}]", inner, count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> DeclaredType {
        DeclaredType::scalar(TypeKind::Int)
    }

    #[test]
    fn test_storage_class() {
        assert_eq!(int().storage_class(), StorageClass::Value);
        assert_eq!(DeclaredType::array_of(int(), 4).storage_class(), StorageClass::Value);
        assert_eq!(DeclaredType::pointer_to(int()).storage_class(), StorageClass::Pointer);
        assert_eq!(DeclaredType::reference_to(int()).storage_class(), StorageClass::Reference);
    }

    #[test]
    fn test_forbidden_kinds() {
        let ptr_to_ref = DeclaredType::pointer_to(DeclaredType::reference_to(int()));
        assert_eq!(ptr_to_ref.find_forbidden(), Some(ForbiddenKind::PointerToReference));

        let array_of_refs = DeclaredType::array_of(DeclaredType::reference_to(int()), 3);
        assert_eq!(array_of_refs.find_forbidden(), Some(ForbiddenKind::ArrayOfReferences));

        // Nested inside an otherwise legal type
        let nested = DeclaredType::pointer_to(DeclaredType::array_of(
            DeclaredType::reference_to(int()),
            2,
        ));
        assert_eq!(nested.find_forbidden(), Some(ForbiddenKind::ArrayOfReferences));

        // Reference to pointer is fine
        let ref_to_ptr = DeclaredType::reference_to(DeclaredType::pointer_to(int()));
        assert_eq!(ref_to_ptr.find_forbidden(), None);
    }

    #[test]
    fn test_reference_collapse() {
        let ref_ref = DeclaredType::reference_to(DeclaredType::reference_to(int()));
        let (collapsed, changed) = ref_ref.collapse_references();
        assert!(changed);
        assert_eq!(collapsed, DeclaredType::reference_to(int()));

        let (same, changed) = DeclaredType::reference_to(int()).collapse_references();
        assert!(!changed);
        assert_eq!(same, DeclaredType::reference_to(int()));
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(int().value_kind(), Some(TypeKind::Int));
        assert_eq!(
            DeclaredType::pointer_to(int()).value_kind(),
            Some(TypeKind::pointer_to(TypeKind::Int))
        );
        assert_eq!(DeclaredType::reference_to(int()).value_kind(), Some(TypeKind::Int));
        assert_eq!(DeclaredType::array_of(int(), 2).value_kind(), None);
    }

    #[test]
    fn test_display() {
        let ty = DeclaredType::pointer_to(DeclaredType::array_of(int(), 5));
        assert_eq!(ty.to_string(), "int[5]*");
        assert_eq!(TypeKind::pointer_to(TypeKind::Bool).to_string(), "bool*");
    }
}

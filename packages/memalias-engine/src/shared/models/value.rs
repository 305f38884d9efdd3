//! Simulated values, addresses and operands

use super::ids::{BindingId, HeapObjectId};
use super::types::TypeKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of a storage location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Address {
    Null,
    /// A binding in some stack frame
    Stack(BindingId),
    /// A heap allocation
    Heap(HeapObjectId),
}

impl Address {
    pub fn is_null(&self) -> bool {
        matches!(self, Address::Null)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Null => write!(f, "null"),
            Address::Stack(id) => write!(f, "&{}", id),
            Address::Heap(id) => write!(f, "&{}", id),
        }
    }
}

/// Content of a storage location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Int(i64),
    Bool(bool),
    Char(char),
    Double(f64),
    Str(String),
    Pointer(Address),
    /// Never written, or moved out of
    Indeterminate,
}

impl Value {
    pub fn null() -> Self {
        Value::Pointer(Address::Null)
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Value::Indeterminate)
    }

    /// Address held by a pointer value
    pub fn as_address(&self) -> Option<Address> {
        match self {
            Value::Pointer(address) => Some(*address),
            _ => None,
        }
    }

    /// Whether this value can inhabit storage of the given kind
    pub fn matches_kind(&self, kind: &TypeKind) -> bool {
        match (self, kind) {
            (Value::Indeterminate, _) => true,
            (Value::Int(_), TypeKind::Int)
            | (Value::Bool(_), TypeKind::Bool)
            | (Value::Char(_), TypeKind::Char)
            | (Value::Double(_), TypeKind::Double)
            | (Value::Str(_), TypeKind::String) => true,
            (Value::Pointer(_), TypeKind::Pointer(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "'{}'", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{:?}", v),
            Value::Pointer(address) => write!(f, "{}", address),
            Value::Indeterminate => write!(f, "<indeterminate>"),
        }
    }
}

/// Right-hand side of an operation
///
/// Only `Place` names addressable storage; everything else is a prvalue that a
/// reference can never bind to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    /// A literal constant such as `5`
    Literal(Value),
    /// Result of an arithmetic or other non-lvalue expression such as `a + b`
    Temporary(Value),
    /// Existing storage
    Place(Address),
    /// `&binding`
    AddressOf(BindingId),
}

impl Operand {
    pub fn place(binding: BindingId) -> Self {
        Operand::Place(Address::Stack(binding))
    }

    pub fn int(v: i64) -> Self {
        Operand::Literal(Value::Int(v))
    }

    pub fn is_addressable(&self) -> bool {
        matches!(self, Operand::Place(_))
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(v) => write!(f, "literal {}", v),
            Operand::Temporary(v) => write!(f, "temporary {}", v),
            Operand::Place(address) => write!(f, "place {}", address),
            Operand::AddressOf(id) => write!(f, "&{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_matches_kind() {
        assert!(Value::Int(1).matches_kind(&TypeKind::Int));
        assert!(!Value::Int(1).matches_kind(&TypeKind::Bool));
        assert!(Value::null().matches_kind(&TypeKind::pointer_to(TypeKind::Int)));
        assert!(Value::Indeterminate.matches_kind(&TypeKind::String));
        assert!(!Value::Str("x".into()).matches_kind(&TypeKind::Named("Point".into())));
    }

    #[test]
    fn test_operand_addressable() {
        assert!(Operand::place(BindingId(0)).is_addressable());
        assert!(!Operand::int(5).is_addressable());
        assert!(!Operand::Temporary(Value::Int(3)).is_addressable());
        assert!(!Operand::AddressOf(BindingId(0)).is_addressable());
    }

    #[test]
    fn test_value_as_address() {
        assert_eq!(Value::null().as_address(), Some(Address::Null));
        assert_eq!(
            Value::Pointer(Address::Heap(HeapObjectId(1))).as_address(),
            Some(Address::Heap(HeapObjectId(1)))
        );
        assert_eq!(Value::Bool(true).as_address(), None);
    }
}

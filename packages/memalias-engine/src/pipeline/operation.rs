//! Operation records and traces
//!
//! A trace is a JSON array of operations, each tagged by `kind`:
//!
//! ```json
//! [
//!   {"kind": "push_frame", "label": "main"},
//!   {"kind": "allocate_scalar", "element_kind": "int"},
//!   {"kind": "release_scalar", "target": {"literal": {"pointer": {"heap": 0}}}},
//!   {"kind": "terminate"}
//! ]
//! ```

use crate::errors::EngineResult;
use crate::features::allocation::ReleaseOutcome;
use crate::features::call_return::{FunctionSignature, ReturnedValue};
use crate::shared::models::{
    Address, BindingId, CallId, DeclaredType, FrameId, HeapObjectId, Operand, TypeKind, Value,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One abstract memory operation fed to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    PushFrame {
        #[serde(default)]
        label: String,
    },
    PopFrame {
        frame: FrameId,
    },
    Declare {
        frame: FrameId,
        name: String,
        declared_type: DeclaredType,
        #[serde(default)]
        init: Option<Operand>,
    },
    /// Reference declaration; `declared_type` is the referent type or a reference type
    BindReference {
        frame: FrameId,
        name: String,
        declared_type: DeclaredType,
        #[serde(default)]
        target: Option<Operand>,
    },
    /// Plain assignment; through the referent for a reference binding
    Assign {
        binding: BindingId,
        value: Operand,
    },
    AssignThroughReference {
        reference: BindingId,
        value: Operand,
    },
    AssignPointer {
        pointer: BindingId,
        target: Operand,
    },
    /// `*pointer = value`
    StoreThrough {
        pointer: BindingId,
        value: Operand,
    },
    Read {
        binding: BindingId,
    },
    Deref {
        binding: BindingId,
    },
    TakeAddress {
        binding: BindingId,
    },
    MoveOut {
        binding: BindingId,
    },
    AllocateScalar {
        element_kind: TypeKind,
        #[serde(default)]
        init: Option<Value>,
    },
    AllocateArray {
        element_kind: TypeKind,
        count: usize,
    },
    ReleaseScalar {
        target: Operand,
    },
    ReleaseArray {
        target: Operand,
    },
    RegisterFunction {
        signature: FunctionSignature,
    },
    Call {
        function: String,
        #[serde(default)]
        args: Vec<Operand>,
    },
    Return {
        call: CallId,
        #[serde(default)]
        value: Option<Operand>,
    },
    /// End of program: run the leak scan
    Terminate,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::PushFrame { .. } => "push_frame",
            Operation::PopFrame { .. } => "pop_frame",
            Operation::Declare { .. } => "declare",
            Operation::BindReference { .. } => "bind_reference",
            Operation::Assign { .. } => "assign",
            Operation::AssignThroughReference { .. } => "assign_through_reference",
            Operation::AssignPointer { .. } => "assign_pointer",
            Operation::StoreThrough { .. } => "store_through",
            Operation::Read { .. } => "read",
            Operation::Deref { .. } => "deref",
            Operation::TakeAddress { .. } => "take_address",
            Operation::MoveOut { .. } => "move_out",
            Operation::AllocateScalar { .. } => "allocate_scalar",
            Operation::AllocateArray { .. } => "allocate_array",
            Operation::ReleaseScalar { .. } => "release_scalar",
            Operation::ReleaseArray { .. } => "release_array",
            Operation::RegisterFunction { .. } => "register_function",
            Operation::Call { .. } => "call",
            Operation::Return { .. } => "return",
            Operation::Terminate => "terminate",
        }
    }
}

/// What an executed operation produced
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    Done,
    Frame(FrameId),
    /// `None` when the declaration was a violation
    Binding(Option<BindingId>),
    Heap(HeapObjectId),
    /// `None` when the access was a violation
    Value(Option<Value>),
    Address(Address),
    Released(ReleaseOutcome),
    /// `None` when overload resolution failed
    Call(Option<CallId>),
    Returned(ReturnedValue),
    Leaks(Vec<HeapObjectId>),
}

/// Ordered sequence of operations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trace {
    operations: Vec<Operation>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_operations(operations: Vec<Operation>) -> Self {
        Self { operations }
    }

    pub fn push(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn from_json(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

impl FromIterator<Operation> for Trace {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        Self {
            operations: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_tagged_operations() {
        let json = r#"[
            {"kind": "push_frame", "label": "main"},
            {"kind": "allocate_scalar", "element_kind": "int"},
            {"kind": "release_scalar", "target": {"literal": {"pointer": {"heap": 0}}}},
            {"kind": "declare", "frame": 0, "name": "x", "declared_type": {"scalar": "int"}},
            {"kind": "bind_reference", "frame": 0, "name": "r", "declared_type": {"scalar": "int"},
             "target": {"place": {"stack": 0}}},
            {"kind": "terminate"}
        ]"#;

        let trace = Trace::from_json(json).unwrap();
        assert_eq!(trace.len(), 6);
        assert_eq!(
            trace.operations()[0],
            Operation::PushFrame {
                label: "main".to_string()
            }
        );
        assert_eq!(
            trace.operations()[2],
            Operation::ReleaseScalar {
                target: Operand::Literal(Value::Pointer(Address::Heap(HeapObjectId(0))))
            }
        );
        assert_eq!(
            trace.operations()[3],
            Operation::Declare {
                frame: FrameId(0),
                name: "x".to_string(),
                declared_type: DeclaredType::scalar(TypeKind::Int),
                init: None,
            }
        );
        assert_eq!(
            trace.operations()[4],
            Operation::BindReference {
                frame: FrameId(0),
                name: "r".to_string(),
                declared_type: DeclaredType::scalar(TypeKind::Int),
                target: Some(Operand::place(BindingId(0))),
            }
        );
        assert_eq!(trace.operations()[5], Operation::Terminate);
    }

    #[test]
    fn test_json_roundtrip() {
        let trace: Trace = vec![
            Operation::PushFrame {
                label: "f".to_string(),
            },
            Operation::Call {
                function: "g".to_string(),
                args: vec![Operand::int(1), Operand::place(BindingId(0))],
            },
            Operation::Return {
                call: CallId(0),
                value: Some(Operand::Temporary(Value::Bool(true))),
            },
        ]
        .into_iter()
        .collect();

        let json = trace.to_json().unwrap();
        assert!(json.contains("\"kind\": \"call\""));
        assert_eq!(Trace::from_json(&json).unwrap(), trace);
    }

    #[test]
    fn test_malformed_trace_is_an_error() {
        assert!(Trace::from_json(r#"[{"kind": "teleport"}]"#).is_err());
        assert!(Trace::from_json(r#"[{"kind": "pop_frame"}]"#).is_err());
    }
}

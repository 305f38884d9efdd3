//! Test data builders

use memalias_engine::{
    Address, BindingId, DeclaredType, Engine, EngineConfig, FrameId, FunctionSignature,
    HeapObjectId, Operand, Operation, Parameter, PassMode, Preset, ReturnMode, Trace, TypeKind,
    Value,
};

pub fn int() -> DeclaredType {
    DeclaredType::scalar(TypeKind::Int)
}

pub fn int_ptr() -> DeclaredType {
    DeclaredType::pointer_to(int())
}

pub fn int_ref() -> DeclaredType {
    DeclaredType::reference_to(int())
}

/// Literal pointer to a heap object
pub fn heap_ptr(id: HeapObjectId) -> Operand {
    Operand::Literal(Value::Pointer(Address::Heap(id)))
}

pub fn null_ptr() -> Operand {
    Operand::Literal(Value::null())
}

/// `name(kind v)` taking one by-value parameter
pub fn unary(name: &str, kind: TypeKind, return_mode: ReturnMode) -> FunctionSignature {
    FunctionSignature::new(name, return_mode).param(Parameter::new("v", PassMode::ByValue, kind))
}

/// Engine with a `main` frame already pushed
pub struct EngineFixture {
    pub engine: Engine,
    pub main: FrameId,
}

impl EngineFixture {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn strict() -> Self {
        Self::with_config(EngineConfig::from_preset(Preset::Strict))
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let mut engine = Engine::new(config).unwrap();
        let main = engine.push_frame("main").unwrap();
        Self { engine, main }
    }

    /// Declare an initialized int in `main`
    pub fn int_local(&mut self, name: &str, value: i64) -> BindingId {
        self.engine
            .declare(self.main, name, int(), Some(Operand::int(value)))
            .unwrap()
            .unwrap()
    }

    /// Declare `int* name = &target` in `frame`
    pub fn pointer_to(&mut self, frame: FrameId, name: &str, target: BindingId) -> BindingId {
        self.engine
            .declare(frame, name, int_ptr(), Some(Operand::AddressOf(target)))
            .unwrap()
            .unwrap()
    }
}

/// Builder for operation traces
#[derive(Debug, Default)]
pub struct TraceBuilder {
    operations: Vec<Operation>,
}

impl TraceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_frame(mut self, label: &str) -> Self {
        self.operations.push(Operation::PushFrame {
            label: label.to_string(),
        });
        self
    }

    pub fn pop_frame(mut self, frame: u32) -> Self {
        self.operations.push(Operation::PopFrame {
            frame: FrameId(frame),
        });
        self
    }

    pub fn declare(
        mut self,
        frame: u32,
        name: &str,
        declared_type: DeclaredType,
        init: Option<Operand>,
    ) -> Self {
        self.operations.push(Operation::Declare {
            frame: FrameId(frame),
            name: name.to_string(),
            declared_type,
            init,
        });
        self
    }

    pub fn deref(mut self, binding: u32) -> Self {
        self.operations.push(Operation::Deref {
            binding: BindingId(binding),
        });
        self
    }

    pub fn allocate_scalar(mut self, element_kind: TypeKind) -> Self {
        self.operations.push(Operation::AllocateScalar {
            element_kind,
            init: None,
        });
        self
    }

    pub fn allocate_array(mut self, element_kind: TypeKind, count: usize) -> Self {
        self.operations.push(Operation::AllocateArray {
            element_kind,
            count,
        });
        self
    }

    pub fn release_scalar(mut self, heap: u32) -> Self {
        self.operations.push(Operation::ReleaseScalar {
            target: heap_ptr(HeapObjectId(heap)),
        });
        self
    }

    pub fn release_array(mut self, heap: u32) -> Self {
        self.operations.push(Operation::ReleaseArray {
            target: heap_ptr(HeapObjectId(heap)),
        });
        self
    }

    pub fn operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn terminate(mut self) -> Self {
        self.operations.push(Operation::Terminate);
        self
    }

    pub fn build(self) -> Trace {
        Trace::from_operations(self.operations)
    }
}

//! Rule engine
//!
//! One `Engine` per simulation run. It owns the memory space and every
//! component, stamps each operation with its index, routes it to the right
//! component and collects the diagnostics.
//!
//! ```rust,ignore
//! let mut engine = Engine::new(EngineConfig::from_preset(Preset::Strict))?;
//! let main = engine.push_frame("main")?;
//! let h = engine.allocate_scalar(TypeKind::Int, None)?;
//! engine.release_scalar(Operand::Literal(Value::Pointer(Address::Heap(h))))?;
//! engine.terminate()?;
//! println!("{}", engine.report().to_json()?);
//! ```
//!
//! Failed operations (`Err`) are harness errors: they change nothing, are not
//! recorded and do not consume an operation index.

use super::operation::{Operation, OperationOutcome, Trace};
use crate::config::{ConfigValidator, EngineConfig};
use crate::errors::{EngineError, EngineResult};
use crate::features::alias_tracking::AliasTracker;
use crate::features::allocation::{AllocationManager, ReleaseOutcome};
use crate::features::call_return::{CallSimulator, FunctionSignature, ReturnedValue};
use crate::features::diagnostics::{
    Diagnostic, DiagnosticReport, DiagnosticReporter, DiagnosticSink, ViolationKind,
};
use crate::features::memory_space::MemorySpace;
use crate::shared::models::{
    Address, BindingId, CallId, DeclaredType, FrameId, HeapObjectId, Operand, TypeKind, Value,
};
use tracing::{debug, info, trace};

#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    space: MemorySpace,
    allocation: AllocationManager,
    tracker: AliasTracker,
    calls: CallSimulator,
    reporter: DiagnosticReporter,
    next_operation: usize,
    recorded: Vec<Operation>,
    terminated: bool,
}

impl Engine {
    /// Create an engine after validating the configuration
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        ConfigValidator::validate_config(&config)?;
        debug!(
            "engine created (preset {}, max_frames {}, max_heap_objects {})",
            config.preset, config.max_frames, config.max_heap_objects
        );
        Ok(Self {
            space: MemorySpace::new(config.max_frames, config.max_heap_objects),
            allocation: AllocationManager::new(),
            tracker: AliasTracker::new(config.flag_indeterminate_reads),
            calls: CallSimulator::new(config.prefer_exact_arity),
            reporter: DiagnosticReporter::new(),
            next_operation: 0,
            recorded: Vec::new(),
            terminated: false,
            config,
        })
    }

    /// Add a diagnostic sink (builder pattern)
    pub fn with_sink(mut self, sink: Box<dyn DiagnosticSink>) -> Self {
        self.reporter.add_sink(sink);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn step<T>(
        &mut self,
        operation: Operation,
        apply: impl FnOnce(&mut Self) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let index = self.next_operation;
        self.reporter.begin_operation(index);
        trace!("op {}: {}", index, operation.name());

        let output = apply(self)?;
        if self.config.record_trace {
            self.recorded.push(operation);
        }
        self.next_operation += 1;
        Ok(output)
    }

    // ---- dispatch ----

    /// Execute one operation record
    pub fn execute(&mut self, operation: Operation) -> EngineResult<OperationOutcome> {
        Ok(match operation {
            Operation::PushFrame { label } => OperationOutcome::Frame(self.push_frame(label)?),
            Operation::PopFrame { frame } => {
                self.pop_frame(frame)?;
                OperationOutcome::Done
            }
            Operation::Declare {
                frame,
                name,
                declared_type,
                init,
            } => OperationOutcome::Binding(self.declare(frame, name, declared_type, init)?),
            Operation::BindReference {
                frame,
                name,
                declared_type,
                target,
            } => {
                let binding = self.bind_reference(frame, name, declared_type, target)?;
                OperationOutcome::Binding(binding)
            }
            Operation::Assign { binding, value } => {
                self.assign(binding, value)?;
                OperationOutcome::Done
            }
            Operation::AssignThroughReference { reference, value } => {
                self.assign_through_reference(reference, value)?;
                OperationOutcome::Done
            }
            Operation::AssignPointer { pointer, target } => {
                self.assign_pointer(pointer, target)?;
                OperationOutcome::Done
            }
            Operation::StoreThrough { pointer, value } => {
                self.store_through(pointer, value)?;
                OperationOutcome::Done
            }
            Operation::Read { binding } => OperationOutcome::Value(self.read(binding)?),
            Operation::Deref { binding } => OperationOutcome::Value(self.deref(binding)?),
            Operation::TakeAddress { binding } => {
                OperationOutcome::Address(self.take_address(binding)?)
            }
            Operation::MoveOut { binding } => {
                self.move_out(binding)?;
                OperationOutcome::Done
            }
            Operation::AllocateScalar { element_kind, init } => {
                OperationOutcome::Heap(self.allocate_scalar(element_kind, init)?)
            }
            Operation::AllocateArray {
                element_kind,
                count,
            } => OperationOutcome::Heap(self.allocate_array(element_kind, count)?),
            Operation::ReleaseScalar { target } => {
                OperationOutcome::Released(self.release_scalar(target)?)
            }
            Operation::ReleaseArray { target } => {
                OperationOutcome::Released(self.release_array(target)?)
            }
            Operation::RegisterFunction { signature } => {
                self.register_function(signature)?;
                OperationOutcome::Done
            }
            Operation::Call { function, args } => OperationOutcome::Call(self.call(function, args)?),
            Operation::Return { call, value } => {
                OperationOutcome::Returned(self.return_from(call, value)?)
            }
            Operation::Terminate => OperationOutcome::Leaks(self.terminate()?),
        })
    }

    /// Replay a whole trace and return the report
    pub fn run(&mut self, trace: &Trace) -> EngineResult<DiagnosticReport> {
        for operation in trace.iter() {
            self.execute(operation.clone())?;
        }
        Ok(self.report())
    }

    // ---- frames and bindings ----

    pub fn push_frame(&mut self, label: impl Into<String>) -> EngineResult<FrameId> {
        let label = label.into();
        let operation = Operation::PushFrame {
            label: label.clone(),
        };
        self.step(operation, |engine| engine.space.push_frame(label))
    }

    /// Pop the innermost frame; aliases into it start dangling.
    ///
    /// A callee frame is popped by returning from its call.
    pub fn pop_frame(&mut self, frame: FrameId) -> EngineResult<()> {
        self.step(Operation::PopFrame { frame }, |engine| {
            if let Some(call) = engine.calls.active_call_for_frame(frame) {
                return Err(EngineError::FrameOwnedByCall { frame, call });
            }
            let destroyed = engine.space.pop_frame(frame)?;
            engine.tracker.on_frame_popped(&engine.space, &destroyed);
            Ok(())
        })
    }

    pub fn declare(
        &mut self,
        frame: FrameId,
        name: impl Into<String>,
        declared_type: DeclaredType,
        init: Option<Operand>,
    ) -> EngineResult<Option<BindingId>> {
        let name = name.into();
        let operation = Operation::Declare {
            frame,
            name: name.clone(),
            declared_type: declared_type.clone(),
            init: init.clone(),
        };
        self.step(operation, |engine| {
            engine.tracker.declare(
                &mut engine.space,
                &mut engine.reporter,
                frame,
                &name,
                declared_type,
                init.as_ref(),
            )
        })
    }

    /// Declare a reference to `target`; a non-reference type is taken as the referent type
    pub fn bind_reference(
        &mut self,
        frame: FrameId,
        name: impl Into<String>,
        declared_type: DeclaredType,
        target: Option<Operand>,
    ) -> EngineResult<Option<BindingId>> {
        let name = name.into();
        let operation = Operation::BindReference {
            frame,
            name: name.clone(),
            declared_type: declared_type.clone(),
            target: target.clone(),
        };
        self.step(operation, |engine| {
            engine.tracker.bind_reference(
                &mut engine.space,
                &mut engine.reporter,
                frame,
                &name,
                declared_type,
                target.as_ref(),
            )
        })
    }

    pub fn assign(&mut self, binding: BindingId, value: Operand) -> EngineResult<()> {
        let operation = Operation::Assign {
            binding,
            value: value.clone(),
        };
        self.step(operation, |engine| {
            engine
                .tracker
                .assign(&mut engine.space, &mut engine.reporter, binding, &value)
        })
    }

    pub fn assign_through_reference(
        &mut self,
        reference: BindingId,
        value: Operand,
    ) -> EngineResult<()> {
        let operation = Operation::AssignThroughReference {
            reference,
            value: value.clone(),
        };
        self.step(operation, |engine| {
            engine.tracker.assign_through_reference(
                &mut engine.space,
                &mut engine.reporter,
                reference,
                &value,
            )
        })
    }

    pub fn assign_pointer(&mut self, pointer: BindingId, target: Operand) -> EngineResult<()> {
        let operation = Operation::AssignPointer {
            pointer,
            target: target.clone(),
        };
        self.step(operation, |engine| {
            engine
                .tracker
                .assign_pointer(&mut engine.space, &mut engine.reporter, pointer, &target)
        })
    }

    pub fn store_through(&mut self, pointer: BindingId, value: Operand) -> EngineResult<()> {
        let operation = Operation::StoreThrough {
            pointer,
            value: value.clone(),
        };
        self.step(operation, |engine| {
            engine
                .tracker
                .store_through(&mut engine.space, &mut engine.reporter, pointer, &value)
        })
    }

    pub fn read(&mut self, binding: BindingId) -> EngineResult<Option<Value>> {
        self.step(Operation::Read { binding }, |engine| {
            engine.tracker.read(&engine.space, &mut engine.reporter, binding)
        })
    }

    pub fn deref(&mut self, binding: BindingId) -> EngineResult<Option<Value>> {
        self.step(Operation::Deref { binding }, |engine| {
            engine.tracker.deref(&engine.space, &mut engine.reporter, binding)
        })
    }

    pub fn take_address(&mut self, binding: BindingId) -> EngineResult<Address> {
        self.step(Operation::TakeAddress { binding }, |engine| {
            engine.tracker.take_address(&engine.space, binding)
        })
    }

    pub fn move_out(&mut self, binding: BindingId) -> EngineResult<()> {
        self.step(Operation::MoveOut { binding }, |engine| {
            engine
                .tracker
                .move_out(&mut engine.space, &mut engine.reporter, binding)
        })
    }

    // ---- heap ----

    pub fn allocate_scalar(
        &mut self,
        element_kind: TypeKind,
        init: Option<Value>,
    ) -> EngineResult<HeapObjectId> {
        let operation = Operation::AllocateScalar {
            element_kind: element_kind.clone(),
            init: init.clone(),
        };
        self.step(operation, |engine| {
            let index = engine.next_operation;
            engine
                .allocation
                .allocate_scalar(&mut engine.space, element_kind, init, index)
        })
    }

    pub fn allocate_array(
        &mut self,
        element_kind: TypeKind,
        count: usize,
    ) -> EngineResult<HeapObjectId> {
        let operation = Operation::AllocateArray {
            element_kind: element_kind.clone(),
            count,
        };
        self.step(operation, |engine| {
            let index = engine.next_operation;
            engine
                .allocation
                .allocate_array(&mut engine.space, element_kind, count, index)
        })
    }

    pub fn release_scalar(&mut self, target: Operand) -> EngineResult<ReleaseOutcome> {
        let operation = Operation::ReleaseScalar {
            target: target.clone(),
        };
        self.step(operation, |engine| engine.release(&target, false))
    }

    pub fn release_array(&mut self, target: Operand) -> EngineResult<ReleaseOutcome> {
        let operation = Operation::ReleaseArray {
            target: target.clone(),
        };
        self.step(operation, |engine| engine.release(&target, true))
    }

    fn release(&mut self, target: &Operand, array: bool) -> EngineResult<ReleaseOutcome> {
        let address = match self
            .tracker
            .evaluate(&self.space, &mut self.reporter, target)?
        {
            Some(Value::Pointer(address)) => address,
            None => return Ok(ReleaseOutcome::Unresolved),
            Some(other) => {
                self.reporter.report(
                    ViolationKind::InvalidFree,
                    vec![],
                    format!("release of {} which is not a heap address", other),
                );
                return Ok(ReleaseOutcome::Rejected(ViolationKind::InvalidFree));
            }
        };

        let outcome = if array {
            self.allocation
                .release_array(&mut self.space, &mut self.reporter, address)?
        } else {
            self.allocation
                .release_scalar(&mut self.space, &mut self.reporter, address)?
        };
        if let ReleaseOutcome::Released(id) = outcome {
            self.tracker.on_heap_released(&self.space, id);
        }
        Ok(outcome)
    }

    // ---- calls ----

    pub fn register_function(&mut self, signature: FunctionSignature) -> EngineResult<()> {
        let operation = Operation::RegisterFunction {
            signature: signature.clone(),
        };
        self.step(operation, |engine| engine.calls.register(signature))
    }

    pub fn call(
        &mut self,
        function: impl Into<String>,
        args: Vec<Operand>,
    ) -> EngineResult<Option<CallId>> {
        let function = function.into();
        let operation = Operation::Call {
            function: function.clone(),
            args: args.clone(),
        };
        self.step(operation, |engine| {
            engine.calls.call(
                &mut engine.space,
                &mut engine.tracker,
                &mut engine.reporter,
                &function,
                &args,
            )
        })
    }

    pub fn return_from(
        &mut self,
        call: CallId,
        value: Option<Operand>,
    ) -> EngineResult<ReturnedValue> {
        let operation = Operation::Return {
            call,
            value: value.clone(),
        };
        self.step(operation, |engine| {
            engine.calls.return_from(
                &mut engine.space,
                &mut engine.tracker,
                &mut engine.reporter,
                call,
                value.as_ref(),
            )
        })
    }

    // ---- termination ----

    /// End of program: report every unreleased allocation once
    pub fn terminate(&mut self) -> EngineResult<Vec<HeapObjectId>> {
        self.step(Operation::Terminate, |engine| {
            let leaked = engine
                .allocation
                .scan_leaks(&engine.space, &mut engine.reporter);
            engine.reporter.flush();
            engine.terminated = true;
            info!(
                "terminated after {} operations: {} diagnostics, {} new leaks",
                engine.next_operation + 1,
                engine.reporter.len(),
                leaked.len()
            );
            Ok(leaked)
        })
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    // ---- queries ----

    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.reporter.diagnostics()
    }

    pub fn report(&self) -> DiagnosticReport {
        self.reporter.build_report()
    }

    pub fn space(&self) -> &MemorySpace {
        &self.space
    }

    pub fn tracker(&self) -> &AliasTracker {
        &self.tracker
    }

    pub fn calls(&self) -> &CallSimulator {
        &self.calls
    }

    /// Operations executed so far
    pub fn operation_count(&self) -> usize {
        self.next_operation
    }

    /// Executed operations, if `record_trace` is on
    pub fn recorded_trace(&self) -> Trace {
        Trace::from_operations(self.recorded.clone())
    }
}

impl Default for Engine {
    fn default() -> Self {
        let config = EngineConfig::default();
        Self {
            space: MemorySpace::new(config.max_frames, config.max_heap_objects),
            allocation: AllocationManager::new(),
            tracker: AliasTracker::new(config.flag_indeterminate_reads),
            calls: CallSimulator::new(config.prefer_exact_arity),
            reporter: DiagnosticReporter::new(),
            next_operation: 0,
            recorded: Vec::new(),
            terminated: false,
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Preset;

    fn int() -> DeclaredType {
        DeclaredType::scalar(TypeKind::Int)
    }

    fn heap(id: HeapObjectId) -> Operand {
        Operand::Literal(Value::Pointer(Address::Heap(id)))
    }

    #[test]
    fn test_operation_indices() {
        let mut engine = Engine::default();
        engine.push_frame("main").unwrap();
        let h = engine.allocate_scalar(TypeKind::Int, None).unwrap();
        engine.release_scalar(heap(h)).unwrap();
        engine.release_scalar(heap(h)).unwrap();

        assert_eq!(engine.operation_count(), 4);
        assert_eq!(engine.diagnostics().len(), 1);
        assert_eq!(engine.diagnostics()[0].operation_index, 3);
        assert_eq!(engine.space().heap_object(h).unwrap().allocated_at, 1);
    }

    #[test]
    fn test_failed_operation_does_not_advance() {
        let mut engine = Engine::default();
        let err = engine.pop_frame(FrameId(0)).unwrap_err();
        assert!(matches!(err, EngineError::UnknownFrame(_)));
        assert_eq!(engine.operation_count(), 0);
        assert!(engine.recorded_trace().is_empty());
    }

    #[test]
    fn test_default_engine_records_nothing() {
        let mut engine = Engine::default();
        engine.push_frame("main").unwrap();
        engine.allocate_scalar(TypeKind::Int, None).unwrap();
        assert_eq!(engine.operation_count(), 2);
        assert!(engine.recorded_trace().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig::from_preset(Preset::Standard).max_frames(0);
        assert!(matches!(Engine::new(config), Err(EngineError::Config(_))));
    }

    #[test]
    fn test_release_through_pointer_binding() {
        let mut engine = Engine::default();
        let main = engine.push_frame("main").unwrap();
        let h = engine.allocate_array(TypeKind::Int, 4).unwrap();
        let p = engine
            .declare(main, "p", DeclaredType::pointer_to(int()), Some(heap(h)))
            .unwrap()
            .unwrap();

        let outcome = engine.release_array(Operand::place(p)).unwrap();
        assert_eq!(outcome, ReleaseOutcome::Released(h));
        assert!(engine.tracker().is_dangling(p));

        engine.deref(p).unwrap();
        assert_eq!(engine.report().count(ViolationKind::DanglingAccess), 1);
    }

    #[test]
    fn test_release_of_non_address_is_invalid_free() {
        let mut engine = Engine::default();
        let main = engine.push_frame("main").unwrap();
        let x = engine
            .declare(main, "x", int(), Some(Operand::int(3)))
            .unwrap()
            .unwrap();

        engine.release_scalar(Operand::place(x)).unwrap();
        engine.release_scalar(Operand::AddressOf(x)).unwrap();
        assert_eq!(engine.report().count(ViolationKind::InvalidFree), 2);
    }

    #[test]
    fn test_recorded_trace_replays_identically() {
        let mut engine = Engine::new(EngineConfig::default().record_trace(true)).unwrap();
        let main = engine.push_frame("main").unwrap();
        let b = engine
            .declare(main, "b", int(), Some(Operand::int(1)))
            .unwrap()
            .unwrap();
        let p = engine
            .declare(main, "p", DeclaredType::pointer_to(int()), Some(Operand::AddressOf(b)))
            .unwrap()
            .unwrap();
        engine.store_through(p, Operand::int(2)).unwrap();
        engine.allocate_scalar(TypeKind::Int, None).unwrap();
        engine.terminate().unwrap();

        let trace = engine.recorded_trace();
        assert_eq!(trace.len(), 6);

        let mut replay = Engine::default();
        let report = replay.run(&trace).unwrap();
        assert_eq!(report, engine.report());
        assert_eq!(
            replay.space().binding(b).unwrap().content,
            Value::Int(2)
        );
    }

    #[test]
    fn test_execute_outcomes() {
        let mut engine = Engine::default();
        let outcome = engine
            .execute(Operation::PushFrame {
                label: "main".to_string(),
            })
            .unwrap();
        assert_eq!(outcome, OperationOutcome::Frame(FrameId(0)));

        let outcome = engine
            .execute(Operation::Declare {
                frame: FrameId(0),
                name: "r".to_string(),
                declared_type: DeclaredType::reference_to(int()),
                init: None,
            })
            .unwrap();
        assert_eq!(outcome, OperationOutcome::Binding(None));
        assert_eq!(engine.report().count(ViolationKind::UnboundReference), 1);

        let outcome = engine.execute(Operation::Terminate).unwrap();
        assert_eq!(outcome, OperationOutcome::Leaks(vec![]));
        assert!(engine.is_terminated());
    }
}

//! Call/return simulator
//!
//! Per-call state machine:
//!
//! ```text
//! Invoked -> ParametersBound -> BodyExecuting -> Returning -> FramePopped
//! ```
//!
//! Overload resolution happens once, at call time. Return values are checked
//! before the call enters `Returning`, while the callee frame still exists; a
//! return that fails with an error leaves the call in `BodyExecuting`.

use super::overload::{OverloadTable, Resolution};
use super::signature::{FunctionSignature, PassMode, ReturnMode};
use crate::errors::{EngineError, EngineResult};
use crate::features::alias_tracking::AliasTracker;
use crate::features::diagnostics::{DiagnosticReporter, ViolationKind};
use crate::features::memory_space::{MemorySpace, Resolved};
use crate::shared::models::{
    Address, BindingId, CallId, EntityRef, FrameId, Operand, TypeKind, Value,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallState {
    Invoked,
    ParametersBound,
    BodyExecuting,
    Returning,
    FramePopped,
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallState::Invoked => write!(f, "invoked"),
            CallState::ParametersBound => write!(f, "parameters-bound"),
            CallState::BodyExecuting => write!(f, "body-executing"),
            CallState::Returning => write!(f, "returning"),
            CallState::FramePopped => write!(f, "frame-popped"),
        }
    }
}

/// One caller operand passed into one callee parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterLink {
    pub parameter: String,
    pub mode: PassMode,
    pub argument: Operand,
    /// Filled in from the parameter's default
    pub defaulted: bool,
    /// Parameter binding in the callee frame; `None` if binding it was a violation
    pub binding: Option<BindingId>,
}

/// How a caller's operands were wired into a callee frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallFrameLink {
    pub call: CallId,
    pub function: String,
    pub caller_frame: Option<FrameId>,
    pub callee_frame: FrameId,
    pub parameters: Vec<ParameterLink>,
}

/// Result handed back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnedValue {
    /// Copied value, or a pointer value for by-pointer returns
    Value(Value),
    /// Storage designated by a by-reference return
    Alias(Address),
    Void,
    /// The return was a violation; there is nothing usable
    Invalid,
}

impl ReturnedValue {
    pub fn is_invalid(&self) -> bool {
        matches!(self, ReturnedValue::Invalid)
    }
}

#[derive(Debug, Clone)]
pub struct CallRecord {
    pub id: CallId,
    pub signature: FunctionSignature,
    pub state: CallState,
    pub frame: FrameId,
    /// Retired when the frame is popped
    pub link: Option<CallFrameLink>,
    pub result: Option<ReturnedValue>,
}

#[derive(Debug, Clone, Default)]
pub struct CallSimulator {
    overloads: OverloadTable,
    calls: Vec<CallRecord>,
    /// Calls whose frame is still on the stack, innermost last
    active: Vec<CallId>,
    prefer_exact_arity: bool,
}

impl CallSimulator {
    pub fn new(prefer_exact_arity: bool) -> Self {
        Self {
            prefer_exact_arity,
            ..Default::default()
        }
    }

    pub fn register(&mut self, signature: FunctionSignature) -> EngineResult<()> {
        self.overloads.register(signature)
    }

    pub fn overloads(&self) -> &OverloadTable {
        &self.overloads
    }

    /// Resolve the overload, push the callee frame and bind parameters.
    ///
    /// Returns `None` when resolution failed; nothing is pushed then.
    pub fn call(
        &mut self,
        space: &mut MemorySpace,
        tracker: &mut AliasTracker,
        reporter: &mut DiagnosticReporter,
        function: &str,
        args: &[Operand],
    ) -> EngineResult<Option<CallId>> {
        let arg_kinds: Vec<Option<TypeKind>> =
            args.iter().map(|arg| argument_kind(&*space, arg)).collect();

        let signature = match self
            .overloads
            .resolve(function, &arg_kinds, self.prefer_exact_arity)
        {
            Resolution::Selected(signature) => signature.clone(),
            Resolution::Ambiguous(candidates) => {
                let names: Vec<String> = candidates.iter().map(|c| c.to_string()).collect();
                reporter.report(
                    ViolationKind::OverloadAmbiguous,
                    vec![],
                    format!(
                        "call {}({}) is ambiguous between {}",
                        function,
                        describe_kinds(&arg_kinds),
                        names.join(" and ")
                    ),
                );
                return Ok(None);
            }
            Resolution::NoMatch => {
                reporter.report(
                    ViolationKind::NoMatchingOverload,
                    vec![],
                    format!(
                        "no overload of '{}' accepts ({})",
                        function,
                        describe_kinds(&arg_kinds)
                    ),
                );
                return Ok(None);
            }
        };

        let supplied = args.iter().cloned().map(|arg| (arg, false));
        let defaults = signature
            .params
            .iter()
            .skip(args.len())
            .filter_map(|param| param.default.clone())
            .map(|value| (Operand::Literal(value), true));
        let arguments: Vec<(Operand, bool)> = supplied.chain(defaults).collect();
        check_arguments(space, tracker, &signature, &arguments)?;

        let id = CallId::from_index(self.calls.len())?;
        let caller_frame = space.top_frame();
        let frame = space.push_frame(signature.name.clone())?;
        debug!("{} {} {} in {}", id, signature, CallState::Invoked, frame);

        let parameters =
            match bind_parameters(space, tracker, reporter, &signature, frame, arguments) {
                Ok(parameters) => parameters,
                Err(err) => {
                    let destroyed = space.pop_frame(frame)?;
                    tracker.on_frame_popped(space, &destroyed);
                    return Err(err);
                }
            };
        debug!("{} {}", id, CallState::ParametersBound);

        let link = CallFrameLink {
            call: id,
            function: signature.to_string(),
            caller_frame,
            callee_frame: frame,
            parameters,
        };
        self.calls.push(CallRecord {
            id,
            signature,
            state: CallState::BodyExecuting,
            frame,
            link: Some(link),
            result: None,
        });
        self.active.push(id);
        debug!("{} {}", id, CallState::BodyExecuting);
        Ok(Some(id))
    }

    /// Check the return value, then pop the callee frame
    pub fn return_from(
        &mut self,
        space: &mut MemorySpace,
        tracker: &mut AliasTracker,
        reporter: &mut DiagnosticReporter,
        call: CallId,
        value: Option<&Operand>,
    ) -> EngineResult<ReturnedValue> {
        let record = self
            .calls
            .get(call.index())
            .ok_or(EngineError::UnknownCall(call))?;
        if self.active.last() != Some(&call) {
            return Err(EngineError::CallNotActive {
                call,
                state: record.state,
            });
        }
        let frame = record.frame;
        let mode = record.signature.return_mode;
        let top = space.top_frame();
        if top != Some(frame) {
            return Err(EngineError::FrameNotOnTop { frame, top });
        }

        let result = match (mode, value) {
            (ReturnMode::Void, _) | (_, None) => ReturnedValue::Void,
            (ReturnMode::ByValue, Some(operand)) => {
                match tracker.evaluate(space, reporter, operand)? {
                    Some(value) => ReturnedValue::Value(value),
                    None => ReturnedValue::Invalid,
                }
            }
            (ReturnMode::ByPointer, Some(operand)) => {
                match tracker.evaluate(space, reporter, operand)? {
                    Some(Value::Pointer(Address::Null)) => ReturnedValue::Value(Value::null()),
                    Some(Value::Pointer(address)) => {
                        if outlives_frame(space, reporter, call, frame, address) {
                            ReturnedValue::Value(Value::Pointer(address))
                        } else {
                            ReturnedValue::Invalid
                        }
                    }
                    Some(Value::Indeterminate) | None => ReturnedValue::Invalid,
                    Some(other) => return Err(EngineError::NotAnAddress(other)),
                }
            }
            (ReturnMode::ByReference, Some(Operand::Place(address))) => {
                let target = space.ultimate_referent(*address);
                if outlives_frame(space, reporter, call, frame, target) {
                    ReturnedValue::Alias(target)
                } else {
                    ReturnedValue::Invalid
                }
            }
            (ReturnMode::ByReference, Some(other)) => {
                reporter.report(
                    ViolationKind::DanglingReturn,
                    vec![call.into()],
                    format!("{} returns a reference to {}", call, other),
                );
                ReturnedValue::Invalid
            }
        };

        self.transition(call, CallState::Returning);

        let destroyed = space.pop_frame(frame)?;
        tracker.on_frame_popped(space, &destroyed);
        self.active.pop();
        if let Some(record) = self.calls.get_mut(call.index()) {
            record.link = None;
            record.result = Some(result.clone());
        }
        self.transition(call, CallState::FramePopped);
        Ok(result)
    }

    fn transition(&mut self, call: CallId, state: CallState) {
        if let Some(record) = self.calls.get_mut(call.index()) {
            debug!("{} {} -> {}", call, record.state, state);
            record.state = state;
        }
    }

    pub fn call_record(&self, call: CallId) -> EngineResult<&CallRecord> {
        self.calls
            .get(call.index())
            .ok_or(EngineError::UnknownCall(call))
    }

    pub fn state(&self, call: CallId) -> EngineResult<CallState> {
        Ok(self.call_record(call)?.state)
    }

    /// Frame link of a call whose frame is still on the stack
    pub fn active_link(&self, call: CallId) -> Option<&CallFrameLink> {
        self.calls.get(call.index()).and_then(|r| r.link.as_ref())
    }

    pub fn active_calls(&self) -> &[CallId] {
        &self.active
    }

    /// Active call whose callee frame is `frame`
    pub fn active_call_for_frame(&self, frame: FrameId) -> Option<CallId> {
        self.active
            .iter()
            .copied()
            .find(|call| self.calls.get(call.index()).map(|r| r.frame) == Some(frame))
    }

    pub fn calls(&self) -> impl Iterator<Item = &CallRecord> {
        self.calls.iter()
    }
}

/// Evaluate every argument the way binding would, without touching any state.
///
/// Harness errors surface here, before the callee frame exists.
fn check_arguments(
    space: &MemorySpace,
    tracker: &AliasTracker,
    signature: &FunctionSignature,
    arguments: &[(Operand, bool)],
) -> EngineResult<()> {
    let mut scratch = DiagnosticReporter::new();
    for (param, (argument, _)) in signature.params.iter().zip(arguments) {
        match param.mode {
            PassMode::ByReference => {}
            PassMode::ByValue => {
                tracker.evaluate(space, &mut scratch, argument)?;
            }
            PassMode::ByPointer => {
                tracker.pointer_value(space, &mut scratch, argument)?;
            }
        }
    }
    Ok(())
}

fn bind_parameters(
    space: &mut MemorySpace,
    tracker: &mut AliasTracker,
    reporter: &mut DiagnosticReporter,
    signature: &FunctionSignature,
    frame: FrameId,
    arguments: Vec<(Operand, bool)>,
) -> EngineResult<Vec<ParameterLink>> {
    let mut parameters = Vec::with_capacity(signature.params.len());
    for (param, (argument, defaulted)) in signature.params.iter().zip(arguments) {
        let binding = match param.mode {
            PassMode::ByReference => tracker.bind_reference(
                space,
                reporter,
                frame,
                &param.name,
                param.declared_type(),
                Some(&argument),
            )?,
            PassMode::ByValue | PassMode::ByPointer => tracker.declare(
                space,
                reporter,
                frame,
                &param.name,
                param.declared_type(),
                Some(&argument),
            )?,
        };
        parameters.push(ParameterLink {
            parameter: param.name.clone(),
            mode: param.mode,
            argument,
            defaulted,
            binding,
        });
    }
    Ok(parameters)
}

/// Whether `address` still designates live storage once `frame` is popped;
/// reports `DanglingReturn` otherwise
fn outlives_frame(
    space: &MemorySpace,
    reporter: &mut DiagnosticReporter,
    call: CallId,
    frame: FrameId,
    address: Address,
) -> bool {
    let problem = match space.resolve(address) {
        Resolved::Binding(binding) if binding.frame == frame => Some("a local of the returning frame"),
        Resolved::Binding(binding) if binding.is_destroyed() => Some("destroyed storage"),
        Resolved::HeapObject(object) if !object.is_live() => Some("a released heap object"),
        Resolved::Invalid => Some("no storage"),
        _ => None,
    };

    match problem {
        None => true,
        Some(what) => {
            let mut involved = vec![EntityRef::from(call)];
            match address {
                Address::Stack(id) => involved.push(id.into()),
                Address::Heap(id) => involved.push(id.into()),
                Address::Null => {}
            }
            reporter.report(
                ViolationKind::DanglingReturn,
                involved,
                format!("{} returns {} designating {}", call, address, what),
            );
            false
        }
    }
}

/// Kind of an argument as seen by overload matching
fn argument_kind(space: &MemorySpace, operand: &Operand) -> Option<TypeKind> {
    match operand {
        Operand::Literal(value) | Operand::Temporary(value) => value_kind(space, value),
        Operand::Place(address) => space.kind_at(space.ultimate_referent(*address)),
        Operand::AddressOf(binding) => space
            .kind_at(space.ultimate_referent(Address::Stack(*binding)))
            .map(TypeKind::pointer_to),
    }
}

fn value_kind(space: &MemorySpace, value: &Value) -> Option<TypeKind> {
    match value {
        Value::Int(_) => Some(TypeKind::Int),
        Value::Bool(_) => Some(TypeKind::Bool),
        Value::Char(_) => Some(TypeKind::Char),
        Value::Double(_) => Some(TypeKind::Double),
        Value::Str(_) => Some(TypeKind::String),
        Value::Pointer(Address::Null) | Value::Indeterminate => None,
        Value::Pointer(address) => space.kind_at(*address).map(TypeKind::pointer_to),
    }
}

fn describe_kinds(kinds: &[Option<TypeKind>]) -> String {
    kinds
        .iter()
        .map(|kind| match kind {
            Some(kind) => kind.to_string(),
            None => "?".to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

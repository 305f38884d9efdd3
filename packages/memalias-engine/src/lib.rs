/*
 * Memalias Engine - Memory & Alias Rule Engine
 *
 * Feature-First Architecture:
 * - shared/      : Common models (ids, addresses, values, declared types)
 * - features/    : Vertical slices (memory_space → allocation → alias_tracking → call_return, diagnostics)
 * - pipeline/    : Orchestration (operation records, traces, engine)
 * - config/      : Presets, builder overrides and YAML files
 *
 * Every operation is checked when it executes; violations are reported as
 * diagnostics and the simulation keeps going.
 */

// Crate-level lint configuration
#![allow(clippy::too_many_arguments)] // Components receive the space, tracker and reporter explicitly
#![allow(clippy::module_inception)] // Module naming intentional
#![allow(clippy::new_without_default)] // Default impl not always needed
#![allow(clippy::should_implement_trait)] // from_str naming intentional
#![allow(clippy::len_without_is_empty)] // Counters, not containers

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports - Feature-First Architecture
// ═══════════════════════════════════════════════════════════════════════════

/// Shared models (ids, addresses, values, declared types)
pub mod shared;

/// Feature modules (memory space, allocation, aliasing, calls, diagnostics)
pub mod features;

/// Pipeline orchestration (engine and traces)
pub mod pipeline;

/// Configuration (presets, builder, YAML)
pub mod config;

/// Engine errors
pub mod errors;

pub use config::{EngineConfig, Preset};
pub use errors::{EngineError, EngineResult};
pub use features::alias_tracking::{AliasGraph, AliasTracker};
pub use features::allocation::{AllocationManager, ReleaseOutcome};
pub use features::call_return::{
    CallSimulator, CallState, FunctionSignature, Parameter, PassMode, ReturnMode, ReturnedValue,
};
pub use features::diagnostics::{
    Diagnostic, DiagnosticReport, DiagnosticReporter, DiagnosticSink, JsonLinesSink, Severity,
    TracingSink, ViolationKind,
};
pub use features::memory_space::MemorySpace;
pub use pipeline::{Engine, Operation, OperationOutcome, Trace};
pub use shared::models::{
    Address, BindingId, CallId, DeclaredType, EntityRef, FrameId, HeapObjectId, Operand,
    StorageClass, TypeKind, Value,
};

//! Allocation manager
//!
//! Heap states:
//! - **Live**: allocated, no successful release yet
//! - **Released**: exactly one matching release happened
//!
//! A mismatched release (scalar vs array) is reported and leaves the object
//! live, so the later matching release still succeeds.

use crate::errors::{EngineError, EngineResult};
use crate::features::diagnostics::{DiagnosticReporter, ViolationKind};
use crate::features::memory_space::{HeapShape, MemorySpace, ReleaseKind, Resolved};
use crate::shared::models::{Address, EntityRef, HeapObjectId, TypeKind, Value};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What a release operation did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleaseOutcome {
    Released(HeapObjectId),
    /// Release of null
    NoOp,
    /// Nothing changed; the violation was reported
    Rejected(ViolationKind),
    /// The release target could not be evaluated (already reported)
    Unresolved,
}

#[derive(Debug, Default, Clone)]
pub struct AllocationManager {
    /// Allocations already reported as leaked
    reported_leaks: FxHashSet<HeapObjectId>,
}

impl AllocationManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_scalar(
        &mut self,
        space: &mut MemorySpace,
        kind: TypeKind,
        initial: Option<Value>,
        operation_index: usize,
    ) -> EngineResult<HeapObjectId> {
        let initial = initial.unwrap_or(Value::Indeterminate);
        if !initial.matches_kind(&kind) {
            return Err(EngineError::InitializerMismatch {
                kind,
                value: initial,
            });
        }
        space.heap_allocate(kind, HeapShape::Scalar, initial, operation_index)
    }

    pub fn allocate_array(
        &mut self,
        space: &mut MemorySpace,
        kind: TypeKind,
        count: usize,
        operation_index: usize,
    ) -> EngineResult<HeapObjectId> {
        if count == 0 {
            return Err(EngineError::EmptyArrayAllocation(count));
        }
        space.heap_allocate(
            kind,
            HeapShape::Array(count),
            Value::Indeterminate,
            operation_index,
        )
    }

    pub fn release_scalar(
        &mut self,
        space: &mut MemorySpace,
        reporter: &mut DiagnosticReporter,
        address: Address,
    ) -> EngineResult<ReleaseOutcome> {
        self.release(space, reporter, address, ReleaseKind::Scalar)
    }

    pub fn release_array(
        &mut self,
        space: &mut MemorySpace,
        reporter: &mut DiagnosticReporter,
        address: Address,
    ) -> EngineResult<ReleaseOutcome> {
        self.release(space, reporter, address, ReleaseKind::Array)
    }

    fn release(
        &mut self,
        space: &mut MemorySpace,
        reporter: &mut DiagnosticReporter,
        address: Address,
        kind: ReleaseKind,
    ) -> EngineResult<ReleaseOutcome> {
        let id = match address {
            Address::Null => {
                debug!("{} of null ignored", kind);
                return Ok(ReleaseOutcome::NoOp);
            }
            Address::Stack(binding) => {
                reporter.report(
                    ViolationKind::InvalidFree,
                    vec![binding.into()],
                    format!("{} of stack storage {}", kind, binding),
                );
                return Ok(ReleaseOutcome::Rejected(ViolationKind::InvalidFree));
            }
            Address::Heap(id) => id,
        };

        let object = match space.resolve(Address::Heap(id)) {
            Resolved::HeapObject(object) => object,
            _ => {
                reporter.report(
                    ViolationKind::InvalidFree,
                    vec![id.into()],
                    format!("{} of {} which was never allocated", kind, id),
                );
                return Ok(ReleaseOutcome::Rejected(ViolationKind::InvalidFree));
            }
        };

        if let Some(released_at) = object.released_at {
            reporter.report(
                ViolationKind::DoubleFree,
                vec![id.into()],
                format!("{} of {} already released at op {}", kind, id, released_at),
            );
            return Ok(ReleaseOutcome::Rejected(ViolationKind::DoubleFree));
        }

        let expected = object.matching_release();
        if expected != kind {
            reporter.report(
                ViolationKind::MismatchedRelease,
                vec![id.into()],
                format!("{} of {} which requires {}", kind, id, expected),
            );
            return Ok(ReleaseOutcome::Rejected(ViolationKind::MismatchedRelease));
        }

        space.mark_released(id, reporter.current_operation())?;
        Ok(ReleaseOutcome::Released(id))
    }

    /// Report every live allocation not yet reported as leaked.
    ///
    /// Returns the newly reported ids; a second scan reports nothing new.
    pub fn scan_leaks(
        &mut self,
        space: &MemorySpace,
        reporter: &mut DiagnosticReporter,
    ) -> Vec<HeapObjectId> {
        let mut leaked = Vec::new();
        for object in space.live_heap_objects() {
            if !self.reported_leaks.insert(object.id) {
                continue;
            }
            let involved: Vec<EntityRef> = vec![object.id.into()];
            reporter.report(
                ViolationKind::Leak,
                involved,
                format!(
                    "{} ({} {:?}) allocated at op {} was never released",
                    object.id, object.element_kind, object.shape, object.allocated_at
                ),
            );
            leaked.push(object.id);
        }
        leaked
    }

    pub fn reported_leak_count(&self) -> usize {
        self.reported_leaks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{BindingId, DeclaredType};

    fn setup() -> (AllocationManager, MemorySpace, DiagnosticReporter) {
        (
            AllocationManager::new(),
            MemorySpace::default(),
            DiagnosticReporter::new(),
        )
    }

    #[test]
    fn test_release_once() {
        let (mut alloc, mut space, mut reporter) = setup();
        let h = alloc.allocate_scalar(&mut space, TypeKind::Int, None, 0).unwrap();

        let first = alloc.release_scalar(&mut space, &mut reporter, Address::Heap(h)).unwrap();
        assert_eq!(first, ReleaseOutcome::Released(h));

        let second = alloc.release_scalar(&mut space, &mut reporter, Address::Heap(h)).unwrap();
        assert_eq!(second, ReleaseOutcome::Rejected(ViolationKind::DoubleFree));
        assert_eq!(reporter.count(ViolationKind::DoubleFree), 1);
        assert_eq!(reporter.len(), 1);
    }

    #[test]
    fn test_mismatched_release_keeps_object_live() {
        let (mut alloc, mut space, mut reporter) = setup();
        let h = alloc.allocate_array(&mut space, TypeKind::Int, 5, 0).unwrap();

        let wrong = alloc.release_scalar(&mut space, &mut reporter, Address::Heap(h)).unwrap();
        assert_eq!(wrong, ReleaseOutcome::Rejected(ViolationKind::MismatchedRelease));
        assert!(space.heap_object(h).unwrap().is_live());

        let right = alloc.release_array(&mut space, &mut reporter, Address::Heap(h)).unwrap();
        assert_eq!(right, ReleaseOutcome::Released(h));
        assert_eq!(reporter.len(), 1);
    }

    #[test]
    fn test_release_stack_and_unknown_is_invalid_free() {
        let (mut alloc, mut space, mut reporter) = setup();
        let frame = space.push_frame("f").unwrap();
        let b = space
            .declare_binding(frame, "x", DeclaredType::scalar(TypeKind::Int), None)
            .unwrap();

        alloc.release_scalar(&mut space, &mut reporter, Address::Stack(b)).unwrap();
        alloc
            .release_array(&mut space, &mut reporter, Address::Heap(HeapObjectId(7)))
            .unwrap();

        assert_eq!(reporter.count(ViolationKind::InvalidFree), 2);
        assert!(reporter.diagnostics()[0].involves(BindingId(0)));
    }

    #[test]
    fn test_release_null_is_silent() {
        let (mut alloc, mut space, mut reporter) = setup();
        let outcome = alloc.release_array(&mut space, &mut reporter, Address::Null).unwrap();
        assert_eq!(outcome, ReleaseOutcome::NoOp);
        assert!(reporter.is_empty());
    }

    #[test]
    fn test_empty_array_rejected() {
        let (mut alloc, mut space, _) = setup();
        let err = alloc.allocate_array(&mut space, TypeKind::Char, 0, 0).unwrap_err();
        assert!(matches!(err, EngineError::EmptyArrayAllocation(0)));
        assert_eq!(space.heap_count(), 0);
    }

    #[test]
    fn test_scalar_initializer_must_fit_kind() {
        let (mut alloc, mut space, _) = setup();
        let pointer_kind = TypeKind::pointer_to(TypeKind::Int);

        let err = alloc
            .allocate_scalar(&mut space, pointer_kind.clone(), Some(Value::Int(5)), 0)
            .unwrap_err();
        assert!(matches!(err, EngineError::InitializerMismatch { .. }));
        assert_eq!(space.heap_count(), 0);

        let h = alloc
            .allocate_scalar(&mut space, pointer_kind, Some(Value::null()), 0)
            .unwrap();
        assert_eq!(space.heap_object(h).unwrap().contents, Value::null());
    }

    #[test]
    fn test_leak_scan_dedup() {
        let (mut alloc, mut space, mut reporter) = setup();
        let freed = alloc.allocate_scalar(&mut space, TypeKind::Int, None, 0).unwrap();
        let leaked = alloc.allocate_array(&mut space, TypeKind::Double, 3, 1).unwrap();
        alloc.release_scalar(&mut space, &mut reporter, Address::Heap(freed)).unwrap();

        assert_eq!(alloc.scan_leaks(&space, &mut reporter), vec![leaked]);
        assert!(alloc.scan_leaks(&space, &mut reporter).is_empty());
        assert_eq!(reporter.count(ViolationKind::Leak), 1);
        assert_eq!(alloc.reported_leak_count(), 1);
    }
}

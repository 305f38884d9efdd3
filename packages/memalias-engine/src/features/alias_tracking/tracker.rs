//! Binding & alias tracker
//!
//! Declares bindings, binds references, moves pointers and performs every
//! access that goes through an alias. Each access checks the designated
//! storage first:
//! - null pointer: `NullDereference`
//! - destroyed binding or released heap object: `DanglingAccess`
//! - never-written storage: `IndeterminateRead` (only when the policy is on)
//!
//! Frame pops and heap releases only mark the affected aliases as dangling;
//! the diagnostic is emitted when one of them is next used.

use super::graph::{AliasEdge, AliasGraph, AliasNode};
use crate::errors::{EngineError, EngineResult};
use crate::features::diagnostics::{DiagnosticReporter, ViolationKind};
use crate::features::memory_space::{BindingTag, MemorySpace, Resolved};
use crate::shared::models::{
    Address, BindingId, DeclaredType, EntityRef, ForbiddenKind, FrameId, HeapObjectId, Operand,
    StorageClass, Value,
};
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

#[derive(Debug, Clone, Default)]
pub struct AliasTracker {
    graph: AliasGraph,
    /// Live pointers/references whose target has been destroyed or released
    dangling: FxHashSet<BindingId>,
    flag_indeterminate_reads: bool,
}

fn entity_of(address: Address) -> Option<EntityRef> {
    match address {
        Address::Null => None,
        Address::Stack(id) => Some(id.into()),
        Address::Heap(id) => Some(id.into()),
    }
}

impl AliasTracker {
    pub fn new(flag_indeterminate_reads: bool) -> Self {
        Self {
            flag_indeterminate_reads,
            ..Default::default()
        }
    }

    pub fn flags_indeterminate_reads(&self) -> bool {
        self.flag_indeterminate_reads
    }

    pub fn graph(&self) -> &AliasGraph {
        &self.graph
    }

    // ---- declarations ----

    /// Declare a binding of any storage class.
    ///
    /// Returns `None` when the declaration itself is a violation and no
    /// binding was created.
    pub fn declare(
        &mut self,
        space: &mut MemorySpace,
        reporter: &mut DiagnosticReporter,
        frame: FrameId,
        name: &str,
        declared_type: DeclaredType,
        init: Option<&Operand>,
    ) -> EngineResult<Option<BindingId>> {
        if let Some(forbidden) = declared_type.find_forbidden() {
            let kind = match forbidden {
                ForbiddenKind::PointerToReference => ViolationKind::PointerToReferenceForbidden,
                ForbiddenKind::ArrayOfReferences => ViolationKind::ArrayOfReferencesForbidden,
            };
            reporter.report(
                kind,
                vec![frame.into()],
                format!("'{}' declared as {}", name, declared_type),
            );
            return Ok(None);
        }

        match declared_type.storage_class() {
            StorageClass::Reference => {
                self.bind_reference(space, reporter, frame, name, declared_type, init)
            }
            StorageClass::Pointer => {
                let initial = match init {
                    Some(operand) => Some(match self.pointer_value(space, reporter, operand)? {
                        Some(address) => Value::Pointer(address),
                        None => Value::Indeterminate,
                    }),
                    None => None,
                };
                let id = space.declare_binding(frame, name, declared_type, initial.clone())?;
                if let Some(Value::Pointer(address)) = initial {
                    self.refresh_pointer(space, id, address);
                }
                Ok(Some(id))
            }
            StorageClass::Value => {
                let initial = match init {
                    Some(operand) => Some(
                        self.evaluate(space, reporter, operand)?
                            .unwrap_or(Value::Indeterminate),
                    ),
                    None => None,
                };
                Ok(Some(space.declare_binding(frame, name, declared_type, initial)?))
            }
        }
    }

    /// Create a reference bound to `target` for its whole lifetime.
    ///
    /// A reference-to-reference type collapses and the binding is tagged.
    /// Binding to another reference binds to that reference's referent.
    pub fn bind_reference(
        &mut self,
        space: &mut MemorySpace,
        reporter: &mut DiagnosticReporter,
        frame: FrameId,
        name: &str,
        declared_type: DeclaredType,
        target: Option<&Operand>,
    ) -> EngineResult<Option<BindingId>> {
        let declared_type = match declared_type.storage_class() {
            StorageClass::Reference => declared_type,
            _ => DeclaredType::reference_to(declared_type),
        };
        let (declared_type, collapsed) = declared_type.collapse_references();
        let tags = if collapsed {
            vec![BindingTag::ReferenceCollapse]
        } else {
            Vec::new()
        };

        let operand = match target {
            Some(operand) => operand,
            None => {
                reporter.report(
                    ViolationKind::UnboundReference,
                    vec![frame.into()],
                    format!("reference '{}' declared without a target", name),
                );
                return Ok(None);
            }
        };

        let address = match operand {
            Operand::Place(address) => space.ultimate_referent(*address),
            other => {
                reporter.report(
                    ViolationKind::InvalidReferenceSource,
                    vec![frame.into()],
                    format!("reference '{}' cannot bind to {}", name, other),
                );
                return Ok(None);
            }
        };

        match space.resolve(address) {
            Resolved::Invalid => {
                reporter.report(
                    ViolationKind::InvalidReferenceSource,
                    entity_of(address).into_iter().collect(),
                    format!("reference '{}' cannot bind to {}: no storage there", name, address),
                );
                return Ok(None);
            }
            resolved if !resolved.is_accessible() => {
                reporter.report(
                    ViolationKind::DanglingAccess,
                    entity_of(address).into_iter().collect(),
                    format!("reference '{}' bound to destroyed storage {}", name, address),
                );
                return Ok(None);
            }
            _ => {}
        }

        let id = space.declare_reference(frame, name, declared_type, address, tags)?;
        self.graph.add_reference(id, address);
        debug!("bind reference {} -> {}", id, address);
        Ok(Some(id))
    }

    // ---- addresses ----

    /// Address designated by `&binding`; for a reference, its referent
    pub fn take_address(&self, space: &MemorySpace, binding: BindingId) -> EngineResult<Address> {
        let record = space.binding(binding)?;
        Ok(match record.alias_target {
            Some(target) if record.is_reference() => space.ultimate_referent(target),
            _ => Address::Stack(binding),
        })
    }

    /// Bound target of a reference binding
    pub fn referent_of(&self, binding: BindingId) -> Option<Address> {
        match self.graph.target_of(binding) {
            Some((node, AliasEdge::Reference)) => Some(node.address()),
            _ => None,
        }
    }

    /// Live bindings whose pointer/reference target has been destroyed
    pub fn dangling_bindings(&self) -> Vec<BindingId> {
        let mut ids: Vec<BindingId> = self.dangling.iter().copied().collect();
        ids.sort();
        ids
    }

    pub fn is_dangling(&self, binding: BindingId) -> bool {
        self.dangling.contains(&binding)
    }

    // ---- writes ----

    /// Plain assignment; dispatches on the storage class of the target.
    ///
    /// An assignment to a reference writes through it; the reference itself
    /// never changes its target.
    pub fn assign(
        &mut self,
        space: &mut MemorySpace,
        reporter: &mut DiagnosticReporter,
        binding: BindingId,
        value: &Operand,
    ) -> EngineResult<()> {
        let class = space.binding(binding)?.class;
        match class {
            StorageClass::Reference => {
                trace!("assignment to reference {} goes through its referent", binding);
                self.assign_through_reference(space, reporter, binding, value)
            }
            StorageClass::Pointer => self.assign_pointer(space, reporter, binding, value),
            StorageClass::Value => {
                if !self.check_binding_alive(space, reporter, binding)? {
                    return Ok(());
                }
                if let Some(value) = self.evaluate(space, reporter, value)? {
                    space.write_binding(binding, value)?;
                }
                Ok(())
            }
        }
    }

    pub fn assign_through_reference(
        &mut self,
        space: &mut MemorySpace,
        reporter: &mut DiagnosticReporter,
        reference: BindingId,
        value: &Operand,
    ) -> EngineResult<()> {
        let record = space.binding_of_class(reference, StorageClass::Reference)?;
        let target = record.alias_target.unwrap_or(Address::Null);
        if !self.check_binding_alive(space, reporter, reference)? {
            return Ok(());
        }

        let Some(value) = self.evaluate(space, reporter, value)? else {
            return Ok(());
        };
        if let Some(target) = self.check_target(space, reporter, reference, target) {
            self.store(space, target, value)?;
        }
        Ok(())
    }

    /// Point a pointer binding somewhere else
    pub fn assign_pointer(
        &mut self,
        space: &mut MemorySpace,
        reporter: &mut DiagnosticReporter,
        pointer: BindingId,
        new_target: &Operand,
    ) -> EngineResult<()> {
        space.binding_of_class(pointer, StorageClass::Pointer)?;
        if !self.check_binding_alive(space, reporter, pointer)? {
            return Ok(());
        }

        if let Some(address) = self.pointer_value(space, reporter, new_target)? {
            space.write_binding(pointer, Value::Pointer(address))?;
            self.refresh_pointer(space, pointer, address);
            debug!("{} now points to {}", pointer, address);
        }
        Ok(())
    }

    /// `*pointer = value`
    pub fn store_through(
        &mut self,
        space: &mut MemorySpace,
        reporter: &mut DiagnosticReporter,
        pointer: BindingId,
        value: &Operand,
    ) -> EngineResult<()> {
        let Some(target) = self.pointee(space, reporter, pointer)? else {
            return Ok(());
        };
        if let Some(value) = self.evaluate(space, reporter, value)? {
            self.store(space, target, value)?;
        }
        Ok(())
    }

    /// Leave a value in the valid-but-unspecified state
    pub fn move_out(
        &mut self,
        space: &mut MemorySpace,
        reporter: &mut DiagnosticReporter,
        binding: BindingId,
    ) -> EngineResult<()> {
        let record = space.binding(binding)?;
        let alias_target = record.alias_target;
        let is_reference = record.is_reference();
        if !self.check_binding_alive(space, reporter, binding)? {
            return Ok(());
        }

        if !is_reference {
            return space.mark_moved_out(binding);
        }
        let target = alias_target.unwrap_or(Address::Null);
        match self.check_target(space, reporter, binding, target) {
            Some(Address::Stack(id)) => space.mark_moved_out(id),
            Some(Address::Heap(id)) => space.write_heap(id, Value::Indeterminate),
            _ => Ok(()),
        }
    }

    // ---- reads ----

    /// Value of an operand, or `None` when the access was a violation
    pub fn evaluate(
        &self,
        space: &MemorySpace,
        reporter: &mut DiagnosticReporter,
        operand: &Operand,
    ) -> EngineResult<Option<Value>> {
        match operand {
            Operand::Literal(value) | Operand::Temporary(value) => Ok(Some(value.clone())),
            Operand::AddressOf(binding) => {
                Ok(Some(Value::Pointer(self.take_address(space, *binding)?)))
            }
            Operand::Place(address) => self.read_address(space, reporter, *address),
        }
    }

    /// Read a binding by name; a reference reads its referent
    pub fn read(
        &self,
        space: &MemorySpace,
        reporter: &mut DiagnosticReporter,
        binding: BindingId,
    ) -> EngineResult<Option<Value>> {
        if !self.check_binding_alive(space, reporter, binding)? {
            return Ok(None);
        }

        let record = space.binding(binding)?;
        if record.is_reference() {
            let target = record.alias_target.unwrap_or(Address::Null);
            return match self.check_target(space, reporter, binding, target) {
                Some(target) => self.read_address(space, reporter, target),
                None => Ok(None),
            };
        }

        if record.content.is_indeterminate() {
            self.report_indeterminate(reporter, Address::Stack(binding));
        }
        Ok(Some(record.content.clone()))
    }

    /// `*pointer`; for a reference, same as reading it
    pub fn deref(
        &self,
        space: &MemorySpace,
        reporter: &mut DiagnosticReporter,
        binding: BindingId,
    ) -> EngineResult<Option<Value>> {
        if space.binding(binding)?.is_reference() {
            return self.read(space, reporter, binding);
        }
        match self.pointee(space, reporter, binding)? {
            Some(target) => self.read_address(space, reporter, target),
            None => Ok(None),
        }
    }

    fn read_address(
        &self,
        space: &MemorySpace,
        reporter: &mut DiagnosticReporter,
        address: Address,
    ) -> EngineResult<Option<Value>> {
        match address {
            Address::Null => {
                reporter.report(ViolationKind::NullDereference, vec![], "read through null");
                Ok(None)
            }
            Address::Stack(binding) => self.read(space, reporter, binding),
            Address::Heap(id) => match space.resolve(address) {
                Resolved::HeapObject(object) if object.is_live() => {
                    if object.contents.is_indeterminate() {
                        self.report_indeterminate(reporter, address);
                    }
                    Ok(Some(object.contents.clone()))
                }
                Resolved::HeapObject(_) => {
                    reporter.report(
                        ViolationKind::DanglingAccess,
                        vec![id.into()],
                        format!("read of released {}", id),
                    );
                    Ok(None)
                }
                _ => Err(EngineError::UnknownHeapObject(id)),
            },
        }
    }

    /// Checked target of a pointer binding
    fn pointee(
        &self,
        space: &MemorySpace,
        reporter: &mut DiagnosticReporter,
        pointer: BindingId,
    ) -> EngineResult<Option<Address>> {
        let record = space.binding_of_class(pointer, StorageClass::Pointer)?;
        let content = record.content.clone();
        if !self.check_binding_alive(space, reporter, pointer)? {
            return Ok(None);
        }

        match content {
            Value::Pointer(address) => Ok(self.check_target(space, reporter, pointer, address)),
            Value::Indeterminate => {
                self.report_indeterminate(reporter, Address::Stack(pointer));
                Ok(None)
            }
            other => Err(EngineError::NotAnAddress(other)),
        }
    }

    pub(crate) fn pointer_value(
        &self,
        space: &MemorySpace,
        reporter: &mut DiagnosticReporter,
        operand: &Operand,
    ) -> EngineResult<Option<Address>> {
        match self.evaluate(space, reporter, operand)? {
            Some(Value::Pointer(address)) => Ok(Some(address)),
            Some(Value::Indeterminate) | None => Ok(None),
            Some(other) => Err(EngineError::NotAnAddress(other)),
        }
    }

    // ---- checks ----

    /// A binding used by name must not have been destroyed
    fn check_binding_alive(
        &self,
        space: &MemorySpace,
        reporter: &mut DiagnosticReporter,
        binding: BindingId,
    ) -> EngineResult<bool> {
        let record = space.binding(binding)?;
        if record.is_destroyed() {
            reporter.report(
                ViolationKind::DanglingAccess,
                vec![binding.into(), record.frame.into()],
                format!("access to {} '{}' after its frame was popped", binding, record.name),
            );
            return Ok(false);
        }
        Ok(true)
    }

    /// Target of an alias if it can be accessed; reports otherwise
    fn check_target(
        &self,
        space: &MemorySpace,
        reporter: &mut DiagnosticReporter,
        via: BindingId,
        target: Address,
    ) -> Option<Address> {
        let target = space.ultimate_referent(target);
        if target.is_null() {
            reporter.report(
                ViolationKind::NullDereference,
                vec![via.into()],
                format!("dereference of null through {}", via),
            );
            return None;
        }

        let resolved = space.resolve(target);
        if resolved.is_accessible() {
            return Some(target);
        }

        let mut involved = vec![EntityRef::from(via)];
        involved.extend(entity_of(target));
        let state = match resolved {
            Resolved::Binding(_) => "destroyed",
            Resolved::HeapObject(_) => "released",
            Resolved::Invalid => "not allocated",
        };
        reporter.report(
            ViolationKind::DanglingAccess,
            involved,
            format!("access through {} to {} which is {}", via, target, state),
        );
        None
    }

    fn report_indeterminate(&self, reporter: &mut DiagnosticReporter, address: Address) {
        if self.flag_indeterminate_reads {
            reporter.report(
                ViolationKind::IndeterminateRead,
                entity_of(address).into_iter().collect(),
                format!("read of {} before it was written", address),
            );
        }
    }

    // ---- state upkeep ----

    fn store(&mut self, space: &mut MemorySpace, target: Address, value: Value) -> EngineResult<()> {
        match target {
            Address::Null => Ok(()),
            Address::Heap(id) => space.write_heap(id, value),
            Address::Stack(id) => {
                let repointed = match (space.binding(id)?.is_pointer(), &value) {
                    (true, Value::Pointer(address)) => Some(*address),
                    _ => None,
                };
                space.write_binding(id, value)?;
                if let Some(address) = repointed {
                    self.refresh_pointer(space, id, address);
                }
                Ok(())
            }
        }
    }

    fn refresh_pointer(&mut self, space: &MemorySpace, pointer: BindingId, target: Address) {
        self.graph.set_pointer(pointer, target);
        self.dangling.remove(&pointer);
        if !target.is_null() && !space.resolve(target).is_accessible() {
            self.dangling.insert(pointer);
        }
    }

    /// Mark aliases into a popped frame as dangling
    pub fn on_frame_popped(&mut self, space: &MemorySpace, destroyed: &[BindingId]) {
        for id in destroyed {
            self.dangling.remove(id);
        }
        for id in destroyed {
            self.mark_sources_dangling(space, AliasNode::Binding(*id));
        }
    }

    /// Mark aliases into a released heap object as dangling
    pub fn on_heap_released(&mut self, space: &MemorySpace, object: HeapObjectId) {
        self.mark_sources_dangling(space, AliasNode::Heap(object));
    }

    fn mark_sources_dangling(&mut self, space: &MemorySpace, node: AliasNode) {
        for source in self.graph.sources_of(node) {
            let alive = space
                .binding(source)
                .map(|binding| !binding.is_destroyed())
                .unwrap_or(false);
            if alive && self.dangling.insert(source) {
                debug!("{} now dangles ({:?} gone)", source, node);
            }
        }
    }
}

//! Memory space: the stack of frames and the heap object table
//!
//! Owns every binding and heap record. Other components read records through
//! the accessors here and mutate them only through the `write_*`/`mark_*`
//! methods, so all state transitions are visible in one place.

use super::domain::{
    Binding, BindingTag, HeapObject, HeapShape, Resolved, StackFrame, Validity,
};
use crate::errors::{EngineError, EngineResult};
use crate::shared::models::{
    Address, BindingId, DeclaredType, FrameId, HeapObjectId, StorageClass, TypeKind, Value,
};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct MemorySpace {
    frames: Vec<StackFrame>,
    /// Active frames, innermost last
    stack: Vec<FrameId>,
    bindings: Vec<Binding>,
    heap: Vec<HeapObject>,
    max_frames: usize,
    max_heap_objects: usize,
}

impl MemorySpace {
    pub fn new(max_frames: usize, max_heap_objects: usize) -> Self {
        Self {
            frames: Vec::new(),
            stack: Vec::new(),
            bindings: Vec::new(),
            heap: Vec::new(),
            max_frames,
            max_heap_objects,
        }
    }

    // ---- frames ----

    pub fn push_frame(&mut self, label: impl Into<String>) -> EngineResult<FrameId> {
        if self.stack.len() >= self.max_frames {
            return Err(EngineError::StackDepthExceeded {
                limit: self.max_frames,
            });
        }

        let id = FrameId::from_index(self.frames.len())?;
        let label = label.into();
        debug!("push frame {} ({}), depth {}", id, label, self.stack.len() + 1);
        self.frames.push(StackFrame {
            id,
            label,
            bindings: Vec::new(),
            popped: false,
        });
        self.stack.push(id);
        Ok(id)
    }

    /// Pop the innermost frame, destroying its bindings.
    ///
    /// Returns the destroyed bindings in declaration order.
    pub fn pop_frame(&mut self, frame: FrameId) -> EngineResult<Vec<BindingId>> {
        let record = self.frame(frame)?;
        if record.popped {
            return Err(EngineError::FrameAlreadyPopped(frame));
        }
        let top = self.top_frame();
        if top != Some(frame) {
            return Err(EngineError::FrameNotOnTop { frame, top });
        }

        self.stack.pop();
        let destroyed = {
            let record = &mut self.frames[frame.index()];
            record.popped = true;
            record.bindings.clone()
        };
        for id in &destroyed {
            self.bindings[id.index()].validity = Validity::Destroyed;
        }

        debug!("pop frame {}, destroyed {} bindings", frame, destroyed.len());
        Ok(destroyed)
    }

    pub fn top_frame(&self) -> Option<FrameId> {
        self.stack.last().copied()
    }

    /// Number of active frames
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn active_frames(&self) -> &[FrameId] {
        &self.stack
    }

    pub fn frame(&self, id: FrameId) -> EngineResult<&StackFrame> {
        self.frames
            .get(id.index())
            .ok_or(EngineError::UnknownFrame(id))
    }

    fn active_frame_mut(&mut self, id: FrameId) -> EngineResult<&mut StackFrame> {
        let frame = self
            .frames
            .get_mut(id.index())
            .ok_or(EngineError::UnknownFrame(id))?;
        if frame.popped {
            return Err(EngineError::FrameAlreadyPopped(id));
        }
        Ok(frame)
    }

    // ---- bindings ----

    /// Declare a value or pointer binding.
    ///
    /// Without an initial value the content is `Indeterminate` and the binding
    /// is tagged so a later read can be flagged by policy.
    pub fn declare_binding(
        &mut self,
        frame: FrameId,
        name: impl Into<String>,
        declared_type: DeclaredType,
        initial: Option<Value>,
    ) -> EngineResult<BindingId> {
        let mut tags = Vec::new();
        let content = match initial {
            Some(value) => value,
            None => {
                tags.push(BindingTag::Indeterminate);
                Value::Indeterminate
            }
        };
        self.insert_binding(frame, name.into(), declared_type, content, None, tags)
    }

    /// Declare a reference binding permanently aliasing `target`
    pub fn declare_reference(
        &mut self,
        frame: FrameId,
        name: impl Into<String>,
        declared_type: DeclaredType,
        target: Address,
        tags: Vec<BindingTag>,
    ) -> EngineResult<BindingId> {
        self.insert_binding(
            frame,
            name.into(),
            declared_type,
            Value::Indeterminate,
            Some(target),
            tags,
        )
    }

    fn insert_binding(
        &mut self,
        frame: FrameId,
        name: String,
        declared_type: DeclaredType,
        content: Value,
        alias_target: Option<Address>,
        tags: Vec<BindingTag>,
    ) -> EngineResult<BindingId> {
        let id = BindingId::from_index(self.bindings.len())?;
        self.active_frame_mut(frame)?.bindings.push(id);

        let class = declared_type.storage_class();
        debug!("declare {} '{}' : {} in {}", id, name, declared_type, frame);
        self.bindings.push(Binding {
            id,
            name,
            frame,
            declared_type,
            class,
            validity: Validity::Live,
            content,
            alias_target,
            tags,
        });
        Ok(id)
    }

    pub fn binding(&self, id: BindingId) -> EngineResult<&Binding> {
        self.bindings
            .get(id.index())
            .ok_or(EngineError::UnknownBinding(id))
    }

    /// Fetch a binding and check its storage class
    pub fn binding_of_class(&self, id: BindingId, expected: StorageClass) -> EngineResult<&Binding> {
        let binding = self.binding(id)?;
        if binding.class != expected {
            return Err(EngineError::kind_mismatch(id, expected, binding.class));
        }
        Ok(binding)
    }

    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter()
    }

    fn binding_mut(&mut self, id: BindingId) -> EngineResult<&mut Binding> {
        self.bindings
            .get_mut(id.index())
            .ok_or(EngineError::UnknownBinding(id))
    }

    /// Store a new value; a moved-out binding becomes live again.
    ///
    /// Pointer bindings only ever hold an address (or nothing yet).
    pub fn write_binding(&mut self, id: BindingId, value: Value) -> EngineResult<()> {
        let binding = self.binding_mut(id)?;
        if binding.is_pointer() {
            ensure_address(&value)?;
        }
        binding.content = value;
        if binding.validity == Validity::MovedOut {
            binding.validity = Validity::Live;
        }
        binding.tags.retain(|tag| *tag != BindingTag::Indeterminate);
        Ok(())
    }

    /// Mark a binding as moved from: addressable, content unspecified
    pub fn mark_moved_out(&mut self, id: BindingId) -> EngineResult<()> {
        let binding = self.binding_mut(id)?;
        if binding.validity == Validity::Live {
            binding.validity = Validity::MovedOut;
            binding.content = Value::Indeterminate;
            debug!("{} moved out", id);
        }
        Ok(())
    }

    // ---- heap ----

    pub fn heap_allocate(
        &mut self,
        element_kind: TypeKind,
        shape: HeapShape,
        contents: Value,
        allocated_at: usize,
    ) -> EngineResult<HeapObjectId> {
        if self.heap.len() >= self.max_heap_objects {
            return Err(EngineError::HeapLimitExceeded {
                limit: self.max_heap_objects,
            });
        }

        let id = HeapObjectId::from_index(self.heap.len())?;
        debug!("allocate {} : {} {:?}", id, element_kind, shape);
        self.heap.push(HeapObject {
            id,
            element_kind,
            shape,
            contents,
            allocated_at,
            released_at: None,
        });
        Ok(id)
    }

    pub fn heap_object(&self, id: HeapObjectId) -> EngineResult<&HeapObject> {
        self.heap
            .get(id.index())
            .ok_or(EngineError::UnknownHeapObject(id))
    }

    pub fn heap_objects(&self) -> impl Iterator<Item = &HeapObject> {
        self.heap.iter()
    }

    pub fn live_heap_objects(&self) -> impl Iterator<Item = &HeapObject> {
        self.heap.iter().filter(|object| object.is_live())
    }

    pub fn write_heap(&mut self, id: HeapObjectId, value: Value) -> EngineResult<()> {
        let object = self
            .heap
            .get_mut(id.index())
            .ok_or(EngineError::UnknownHeapObject(id))?;
        if object.element_kind.is_pointer() {
            ensure_address(&value)?;
        }
        object.contents = value;
        Ok(())
    }

    /// Record the single successful release of a heap object
    pub fn mark_released(&mut self, id: HeapObjectId, released_at: usize) -> EngineResult<()> {
        let object = self
            .heap
            .get_mut(id.index())
            .ok_or(EngineError::UnknownHeapObject(id))?;
        object.released_at = Some(released_at);
        debug!("release {}", id);
        Ok(())
    }

    // ---- addresses ----

    pub fn resolve(&self, address: Address) -> Resolved<'_> {
        match address {
            Address::Null => Resolved::Invalid,
            Address::Stack(id) => self
                .bindings
                .get(id.index())
                .map(Resolved::Binding)
                .unwrap_or(Resolved::Invalid),
            Address::Heap(id) => self
                .heap
                .get(id.index())
                .map(Resolved::HeapObject)
                .unwrap_or(Resolved::Invalid),
        }
    }

    /// Follow reference bindings to the storage they alias
    pub fn ultimate_referent(&self, address: Address) -> Address {
        let mut current = address;
        while let Address::Stack(id) = current {
            match self.bindings.get(id.index()).and_then(|b| b.alias_target) {
                Some(next) if next != current => current = next,
                _ => break,
            }
        }
        current
    }

    /// Kind of the storage at an address, as seen by overload matching
    pub fn kind_at(&self, address: Address) -> Option<TypeKind> {
        match self.resolve(address) {
            Resolved::Binding(binding) => binding.declared_type.value_kind(),
            Resolved::HeapObject(object) => Some(object.element_kind.clone()),
            Resolved::Invalid => None,
        }
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn heap_count(&self) -> usize {
        self.heap.len()
    }
}

fn ensure_address(value: &Value) -> EngineResult<()> {
    match value {
        Value::Pointer(_) | Value::Indeterminate => Ok(()),
        other => Err(EngineError::NotAnAddress(other.clone())),
    }
}

impl Default for MemorySpace {
    fn default() -> Self {
        Self::new(10_000, 100_000)
    }
}

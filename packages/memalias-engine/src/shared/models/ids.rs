//! Stable integer identifiers for engine records
//!
//! Every record lives in an arena owned by one engine instance and is addressed
//! by one of these ids. Ids are handed out sequentially from zero, so a recorded
//! trace can refer to them before the run happens.

use crate::errors::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Arena slot for this id
            pub fn index(self) -> usize {
                self.0 as usize
            }

            pub(crate) fn from_index(index: usize) -> EngineResult<Self> {
                u32::try_from(index)
                    .map(Self)
                    .map_err(|_| EngineError::IdSpaceExhausted {
                        kind: stringify!($name),
                        index,
                    })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Identifies one stack frame
    FrameId,
    "f"
);

define_id!(
    /// Identifies one named storage location (value, pointer or reference)
    BindingId,
    "b"
);

define_id!(
    /// Identifies one heap allocation record
    HeapObjectId,
    "h"
);

define_id!(
    /// Identifies one simulated function invocation
    CallId,
    "c"
);

/// Any record a diagnostic can point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "entity", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    Frame(FrameId),
    Binding(BindingId),
    Heap(HeapObjectId),
    Call(CallId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Frame(id) => write!(f, "{}", id),
            EntityRef::Binding(id) => write!(f, "{}", id),
            EntityRef::Heap(id) => write!(f, "{}", id),
            EntityRef::Call(id) => write!(f, "{}", id),
        }
    }
}

impl From<FrameId> for EntityRef {
    fn from(id: FrameId) -> Self {
        EntityRef::Frame(id)
    }
}

impl From<BindingId> for EntityRef {
    fn from(id: BindingId) -> Self {
        EntityRef::Binding(id)
    }
}

impl From<HeapObjectId> for EntityRef {
    fn from(id: HeapObjectId) -> Self {
        EntityRef::Heap(id)
    }
}

impl From<CallId> for EntityRef {
    fn from(id: CallId) -> Self {
        EntityRef::Call(id)
    }
}

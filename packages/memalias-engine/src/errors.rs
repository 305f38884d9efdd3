//! Error types for memalias-engine
//!
//! Rule violations are never errors: they are reported as diagnostics and the
//! run continues. `EngineError` covers harness misuse only (unknown ids,
//! out-of-order frame pops, malformed traces, exceeded limits).

use crate::config::ConfigError;
use crate::features::call_return::CallState;
use crate::shared::models::{
    BindingId, CallId, FrameId, HeapObjectId, StorageClass, TypeKind, Value,
};
use thiserror::Error;

/// Main error type for engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unknown frame {0}")]
    UnknownFrame(FrameId),

    #[error("Unknown binding {0}")]
    UnknownBinding(BindingId),

    #[error("Unknown heap object {0}")]
    UnknownHeapObject(HeapObjectId),

    #[error("Unknown call {0}")]
    UnknownCall(CallId),

    /// Frames are popped strictly in LIFO order
    #[error("Frame {frame} is not on top of the stack (top is {})", describe_top(.top))]
    FrameNotOnTop { frame: FrameId, top: Option<FrameId> },

    /// Callee frames are retired by returning from their call
    #[error("Frame {frame} belongs to active call {call}; return from the call instead")]
    FrameOwnedByCall { frame: FrameId, call: CallId },

    #[error("Frame {0} has already been popped")]
    FrameAlreadyPopped(FrameId),

    #[error("Binding {binding} is a {found} binding, expected {expected}")]
    KindMismatch {
        binding: BindingId,
        expected: StorageClass,
        found: StorageClass,
    },

    #[error("Value {0} does not hold an address")]
    NotAnAddress(Value),

    #[error("Initial value {value} does not fit a {kind} allocation")]
    InitializerMismatch { kind: TypeKind, value: Value },

    #[error("Invalid signature for '{name}': {reason}")]
    InvalidSignature { name: String, reason: String },

    #[error("Call {call} is not the innermost active call (state: {state})")]
    CallNotActive { call: CallId, state: CallState },

    #[error("Stack depth limit of {limit} frames exceeded")]
    StackDepthExceeded { limit: usize },

    #[error("Heap object limit of {limit} allocations exceeded")]
    HeapLimitExceeded { limit: usize },

    #[error("Array allocation of {0} elements is not allowed; count must be at least 1")]
    EmptyArrayAllocation(usize),

    #[error("No {kind} ids left: slot {index} does not fit in 32 bits")]
    IdSpaceExhausted { kind: &'static str, index: usize },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Trace (de)serialization error
    #[error("Trace serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn kind_mismatch(binding: BindingId, expected: StorageClass, found: StorageClass) -> Self {
        EngineError::KindMismatch {
            binding,
            expected,
            found,
        }
    }

    pub fn invalid_signature(name: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::InvalidSignature {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

fn describe_top(top: &Option<FrameId>) -> String {
    match top {
        Some(frame) => frame.to_string(),
        None => "empty".to_string(),
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_formatting() {
        let err = EngineError::FrameNotOnTop {
            frame: FrameId(0),
            top: Some(FrameId(2)),
        };
        let msg = err.to_string();
        assert_eq!(msg, "Frame f0 is not on top of the stack (top is f2)");

        let err = EngineError::FrameNotOnTop {
            frame: FrameId(1),
            top: None,
        };
        assert_eq!(err.to_string(), "Frame f1 is not on top of the stack (top is empty)");

        let err = EngineError::kind_mismatch(BindingId(4), StorageClass::Pointer, StorageClass::Value);
        assert_eq!(err.to_string(), "Binding b4 is a value binding, expected pointer");
    }

    #[test]
    fn test_invalid_signature_message() {
        let err = EngineError::invalid_signature("f", "default values must be trailing");
        let msg = err.to_string();
        assert!(msg.contains("'f'"));
        assert!(msg.contains("trailing"));
    }
}

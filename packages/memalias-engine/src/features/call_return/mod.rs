//! Call/Return Simulator
//!
//! Parameter passing (value, pointer, reference), the return modes, lifetime
//! checks at frame-pop time and overload selection.

pub mod overload;
pub mod signature;
pub mod simulator;

pub use overload::{resolve, OverloadTable, Resolution};
pub use signature::{FunctionSignature, Parameter, PassMode, ReturnMode};
pub use simulator::{
    CallFrameLink, CallRecord, CallSimulator, CallState, ParameterLink, ReturnedValue,
};

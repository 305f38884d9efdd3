//! Diagnostic Reporter
//!
//! Converts detected violations into classified, structured records.
//!
//! - `domain`: violation taxonomy, severity, `Diagnostic`
//! - `ports`: `DiagnosticSink` for external consumers
//! - `infrastructure`: tracing and JSON-lines sinks
//! - `reporter`: the collecting reporter and the final `DiagnosticReport`

pub mod domain;
pub mod infrastructure;
pub mod ports;
pub mod reporter;

pub use domain::{Diagnostic, Severity, ViolationKind};
pub use infrastructure::{JsonLinesSink, TracingSink};
pub use ports::DiagnosticSink;
pub use reporter::{DiagnosticReport, DiagnosticReporter};

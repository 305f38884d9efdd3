//! Diagnostic sink port
//!
//! External consumers of diagnostics (formatters, loggers, streams) implement
//! `DiagnosticSink`. The reporter forwards every diagnostic to each sink in
//! registration order; sinks only observe.

use super::domain::Diagnostic;

pub trait DiagnosticSink: Send {
    /// Receive one diagnostic as soon as it is reported
    fn accept(&mut self, diagnostic: &Diagnostic);

    /// Sink name for debugging and logging
    fn name(&self) -> &'static str;

    /// Called once when the run is terminated
    fn flush(&mut self) {}
}

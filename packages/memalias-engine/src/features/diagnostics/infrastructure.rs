//! Diagnostic sink adapters

use super::domain::{Diagnostic, Severity};
use super::ports::DiagnosticSink;
use std::io::Write;

/// Emits each diagnostic as a `tracing` event
#[derive(Debug, Default)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

impl DiagnosticSink for TracingSink {
    fn accept(&mut self, diagnostic: &Diagnostic) {
        let involved: Vec<String> = diagnostic.involved_ids.iter().map(|id| id.to_string()).collect();
        match diagnostic.severity {
            Severity::Warning => tracing::warn!(
                kind = ?diagnostic.violation_kind,
                op = diagnostic.operation_index,
                involved = ?involved,
                "{}",
                diagnostic.message
            ),
            Severity::Error | Severity::Critical => tracing::error!(
                kind = ?diagnostic.violation_kind,
                op = diagnostic.operation_index,
                involved = ?involved,
                "{}",
                diagnostic.message
            ),
        }
    }

    fn name(&self) -> &'static str {
        "TracingSink"
    }
}

/// Streams diagnostics as JSON lines to a writer
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
    write_failures: usize,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            write_failures: 0,
        }
    }

    /// Diagnostics that could not be written
    pub fn write_failures(&self) -> usize {
        self.write_failures
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> DiagnosticSink for JsonLinesSink<W> {
    fn accept(&mut self, diagnostic: &Diagnostic) {
        let written = serde_json::to_writer(&mut self.writer, diagnostic)
            .map_err(std::io::Error::from)
            .and_then(|_| self.writer.write_all(b"\n"));
        if let Err(e) = written {
            self.write_failures += 1;
            tracing::error!("JsonLinesSink failed to write diagnostic: {}", e);
        }
    }

    fn name(&self) -> &'static str {
        "JsonLinesSink"
    }

    fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::error!("JsonLinesSink flush failed: {}", e);
        }
    }
}

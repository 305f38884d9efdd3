//! Diagnostic reporter
//!
//! Pure sink: it stamps diagnostics with the index of the operation being
//! processed, stores them, and forwards them to registered sinks. It never
//! decides whether something is a violation.

use super::domain::{Diagnostic, ViolationKind};
use super::ports::DiagnosticSink;
use crate::shared::models::EntityRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Default)]
pub struct DiagnosticReporter {
    diagnostics: Vec<Diagnostic>,
    current_operation: usize,
    sinks: Vec<Box<dyn DiagnosticSink>>,
}

impl DiagnosticReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink (builder pattern)
    pub fn with_sink(mut self, sink: Box<dyn DiagnosticSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn add_sink(&mut self, sink: Box<dyn DiagnosticSink>) {
        self.sinks.push(sink);
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Stamp subsequent diagnostics with this operation index
    pub fn begin_operation(&mut self, index: usize) {
        self.current_operation = index;
    }

    pub fn current_operation(&self) -> usize {
        self.current_operation
    }

    pub fn report(
        &mut self,
        kind: ViolationKind,
        involved_ids: Vec<EntityRef>,
        message: impl Into<String>,
    ) {
        let diagnostic = Diagnostic::new(kind, self.current_operation, involved_ids, message);
        tracing::debug!("diagnostic: {}", diagnostic);
        for sink in &mut self.sinks {
            sink.accept(&diagnostic);
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Diagnostics reported after the given mark (see `len`)
    pub fn since(&self, mark: usize) -> &[Diagnostic] {
        &self.diagnostics[mark.min(self.diagnostics.len())..]
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn count(&self, kind: ViolationKind) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.violation_kind == kind)
            .count()
    }

    pub fn flush(&mut self) {
        for sink in &mut self.sinks {
            sink.flush();
        }
    }

    /// Snapshot of everything reported so far
    pub fn build_report(&self) -> DiagnosticReport {
        DiagnosticReport::from_diagnostics(self.diagnostics.clone())
    }
}

impl std::fmt::Debug for DiagnosticReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticReporter")
            .field("diagnostics", &self.diagnostics.len())
            .field("current_operation", &self.current_operation)
            .field("sinks", &self.sink_names())
            .finish()
    }
}

/// Structured, classified report of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub diagnostics: Vec<Diagnostic>,
    pub counts: BTreeMap<ViolationKind, usize>,
}

impl DiagnosticReport {
    pub fn from_diagnostics(diagnostics: Vec<Diagnostic>) -> Self {
        let mut counts = BTreeMap::new();
        for diagnostic in &diagnostics {
            *counts.entry(diagnostic.violation_kind).or_insert(0) += 1;
        }
        Self {
            diagnostics,
            counts,
        }
    }

    pub fn count(&self, kind: ViolationKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn has_violations(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn of_kind(&self, kind: ViolationKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(move |d| d.violation_kind == kind)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::diagnostics::infrastructure::JsonLinesSink;
    use crate::shared::models::HeapObjectId;

    #[test]
    fn test_reporter_stamps_operation_index() {
        let mut reporter = DiagnosticReporter::new();
        reporter.begin_operation(7);
        reporter.report(ViolationKind::DoubleFree, vec![HeapObjectId(0).into()], "twice");

        assert_eq!(reporter.len(), 1);
        assert_eq!(reporter.diagnostics()[0].operation_index, 7);
    }

    #[test]
    fn test_since_mark() {
        let mut reporter = DiagnosticReporter::new();
        reporter.report(ViolationKind::Leak, vec![], "a");
        let mark = reporter.len();
        reporter.report(ViolationKind::Leak, vec![], "b");
        reporter.report(ViolationKind::InvalidFree, vec![], "c");

        let recent = reporter.since(mark);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].violation_kind, ViolationKind::InvalidFree);
        assert!(reporter.since(100).is_empty());
    }

    #[test]
    fn test_report_counts() {
        let mut reporter = DiagnosticReporter::new();
        reporter.report(ViolationKind::Leak, vec![], "a");
        reporter.report(ViolationKind::Leak, vec![], "b");
        reporter.report(ViolationKind::DanglingAccess, vec![], "c");

        let report = reporter.build_report();
        assert_eq!(report.count(ViolationKind::Leak), 2);
        assert_eq!(report.count(ViolationKind::DanglingAccess), 1);
        assert_eq!(report.count(ViolationKind::DoubleFree), 0);
        assert_eq!(report.total(), 3);
        assert_eq!(report.of_kind(ViolationKind::Leak).count(), 2);
    }

    #[test]
    fn test_report_json() {
        let mut reporter = DiagnosticReporter::new();
        reporter.report(ViolationKind::InvalidFree, vec![], "stack address");
        let json = reporter.build_report().to_json().unwrap();
        assert!(json.contains("InvalidFree"));

        let parsed: DiagnosticReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.count(ViolationKind::InvalidFree), 1);
    }

    #[test]
    fn test_sinks_receive_diagnostics() {
        let mut reporter =
            DiagnosticReporter::new().with_sink(Box::new(JsonLinesSink::new(Vec::new())));
        reporter.report(ViolationKind::Leak, vec![], "leak");
        assert_eq!(reporter.sink_names(), vec!["JsonLinesSink"]);
        assert_eq!(reporter.len(), 1);
    }
}

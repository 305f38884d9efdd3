//! Custom assertions for diagnostic verification

use memalias_engine::{DiagnosticReport, ViolationKind};

/// Assert that the report holds no diagnostics at all
pub fn assert_clean(report: &DiagnosticReport) {
    assert!(
        !report.has_violations(),
        "Expected no diagnostics, got: {:?}",
        report
            .diagnostics
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
    );
}

/// Assert the report holds exactly `expected` diagnostics of `kind`
pub fn assert_count(report: &DiagnosticReport, kind: ViolationKind, expected: usize) {
    assert_eq!(
        report.count(kind),
        expected,
        "Expected {expected} {kind} diagnostics, got {}. Diagnostics: {:?}",
        report.count(kind),
        report
            .diagnostics
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
    );
}

/// Assert the report holds exactly one diagnostic, of `kind`, at `operation_index`
pub fn assert_single(report: &DiagnosticReport, kind: ViolationKind, operation_index: usize) {
    assert_eq!(
        report.total(),
        1,
        "Expected a single diagnostic, got: {:?}",
        report
            .diagnostics
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
    );
    let diagnostic = &report.diagnostics[0];
    assert_eq!(diagnostic.violation_kind, kind);
    assert_eq!(diagnostic.operation_index, operation_index);
}

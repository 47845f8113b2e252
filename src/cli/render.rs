// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Plain-text rendering of a suite report.

use std::fmt::Write;

use crate::verdict::{ReportEntry, SuiteReport};

fn expectation_marker(entry: &ReportEntry) -> &'static str {
    if entry.probe.control {
        return match entry.expectation_met {
            Some(false) => "  [control failed]",
            _ => "  [control]",
        };
    }
    match entry.expectation_met {
        Some(true) => "",
        Some(false) => "  [unexpected]",
        None => "",
    }
}

/// Human-readable report: one line per probe, then counts and verdict.
pub fn text(report: &SuiteReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Run {} ({} probes)", report.run_id(), report.entries().len());
    let width = report
        .entries()
        .iter()
        .map(|e| e.probe.name.len())
        .max()
        .unwrap_or(0);

    for entry in report.entries() {
        let _ = writeln!(
            out,
            "  {:<width$}  {:<18}  {:<12}  {:>6}ms  {}{}",
            entry.probe.name,
            entry.probe.category.as_str(),
            entry.outcome.kind.as_str(),
            entry.outcome.elapsed.as_millis(),
            entry.outcome.explanation,
            expectation_marker(entry),
        );
    }

    for note in report.notes() {
        let _ = writeln!(out, "note: {note}");
    }

    let counts = report.counts();
    let _ = writeln!(
        out,
        "blocked={} succeeded={} inconclusive={} crashed={}",
        counts.blocked, counts.succeeded, counts.inconclusive, counts.crashed
    );
    let _ = writeln!(out, "verdict: {}", report.verdict());
    out
}

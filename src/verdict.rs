// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Verdict Aggregator: reduces a suite's outcomes to one verdict and an
//! immutable report.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::SandboxLimits;
use crate::environment::HostSnapshot;
use crate::outcome::{Outcome, OutcomeKind};
use crate::probe::ProbeDescriptor;
use crate::runner::CleanupStatus;

/// Suite-level conclusion about the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Verdict {
    /// Every probe was blocked or inconclusive, and at least one was blocked.
    AllBoundariesHeld,
    /// At least one probe crossed its boundary.
    BoundaryViolationsFound,
    /// Nothing conclusive either way.
    IndeterminateResults,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllBoundariesHeld => "all-boundaries-held",
            Self::BoundaryViolationsFound => "boundary-violations-found",
            Self::IndeterminateResults => "indeterminate-results",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of outcomes of each kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub blocked: usize,
    pub succeeded: usize,
    pub inconclusive: usize,
    pub crashed: usize,
}

impl OutcomeCounts {
    pub fn from_kinds(kinds: impl IntoIterator<Item = OutcomeKind>) -> Self {
        let mut counts = Self::default();
        for kind in kinds {
            match kind {
                OutcomeKind::Blocked => counts.blocked += 1,
                OutcomeKind::Succeeded => counts.succeeded += 1,
                OutcomeKind::Inconclusive => counts.inconclusive += 1,
                OutcomeKind::Crashed => counts.crashed += 1,
            }
        }
        counts
    }

    pub fn get(&self, kind: OutcomeKind) -> usize {
        match kind {
            OutcomeKind::Blocked => self.blocked,
            OutcomeKind::Succeeded => self.succeeded,
            OutcomeKind::Inconclusive => self.inconclusive,
            OutcomeKind::Crashed => self.crashed,
        }
    }

    pub fn total(&self) -> usize {
        self.blocked + self.succeeded + self.inconclusive + self.crashed
    }

    pub fn verdict(&self) -> Verdict {
        if self.succeeded > 0 {
            Verdict::BoundaryViolationsFound
        } else if self.blocked > 0 && self.crashed == 0 {
            Verdict::AllBoundariesHeld
        } else {
            Verdict::IndeterminateResults
        }
    }
}

/// Reduce outcome kinds to a verdict. Pure; an empty suite is indeterminate.
pub fn aggregate(kinds: impl IntoIterator<Item = OutcomeKind>) -> Verdict {
    OutcomeCounts::from_kinds(kinds).verdict()
}

/// One probe's line in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub probe: ProbeDescriptor,
    pub outcome: Outcome,
    pub cleanup: CleanupStatus,
    /// `None` when the probe declared no expectation.
    pub expectation_met: Option<bool>,
}

impl ReportEntry {
    pub fn new(probe: ProbeDescriptor, outcome: Outcome, cleanup: CleanupStatus) -> Self {
        let expectation_met = probe.expected.map(|expected| expected == outcome.kind);
        Self {
            probe,
            outcome,
            cleanup,
            expectation_met,
        }
    }
}

/// Result of one suite run. Built once; read-only afterwards.
///
/// Counts and verdict cover boundary probes only. Controls are reported as
/// entries, and a failed control demotes a held verdict to indeterminate.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    entries: Vec<ReportEntry>,
    counts: OutcomeCounts,
    verdict: Verdict,
    host: Option<HostSnapshot>,
    declared_limits: Option<SandboxLimits>,
    notes: Vec<String>,
}

impl SuiteReport {
    pub fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        entries: Vec<ReportEntry>,
        host: Option<HostSnapshot>,
        declared_limits: Option<SandboxLimits>,
    ) -> Self {
        let counts = OutcomeCounts::from_kinds(
            entries
                .iter()
                .filter(|e| !e.probe.control)
                .map(|e| e.outcome.kind),
        );
        let mut notes = match (&host, &declared_limits) {
            (Some(host), Some(declared)) => host.notes(declared),
            _ => Vec::new(),
        };
        let failed_controls: Vec<&ReportEntry> = entries
            .iter()
            .filter(|e| e.probe.control && e.outcome.kind != OutcomeKind::Succeeded)
            .collect();
        for entry in &failed_controls {
            notes.push(format!(
                "control {} was {}: held boundaries may reflect a broken environment",
                entry.probe.name, entry.outcome.kind
            ));
        }
        let verdict = match counts.verdict() {
            Verdict::AllBoundariesHeld if !failed_controls.is_empty() => Verdict::IndeterminateResults,
            verdict => verdict,
        };
        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            entries,
            verdict,
            counts,
            host,
            declared_limits,
            notes,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn counts(&self) -> OutcomeCounts {
        self.counts
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn host(&self) -> Option<&HostSnapshot> {
        self.host.as_ref()
    }

    pub fn declared_limits(&self) -> Option<&SandboxLimits> {
        self.declared_limits.as_ref()
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Entries whose outcome differed from the declared expectation.
    pub fn unmet_expectations(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.expectation_met == Some(false))
    }
}

// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Security audit logging.
//!
//! Every classified probe outcome is a security-relevant fact about the
//! sandbox and is logged here with a fixed event name and severity.

use crate::outcome::{OutcomeKind, RawResult};

/// Security event types for audit logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEvent {
    /// A probe was blocked by the sandbox.
    BoundaryHeld,
    /// A probe crossed a boundary.
    BoundaryViolation,
    /// A probe's outcome could not be classified.
    ProbeInconclusive,
    /// A probe ran out of budget.
    ProbeTimedOut,
    /// The harness failed while running a probe.
    ProbeCrashed,
    /// A probe's cleanup exceeded its bound.
    CleanupOverran,
    /// A destructive probe is scheduled ahead of others.
    DestructiveOrdering,
    /// An operation the sandbox must allow worked.
    ControlPassed,
    /// An operation the sandbox must allow did not work.
    ControlFailed,
    SuiteStarted,
    SuiteFinished,
}

impl SecurityEvent {
    pub fn severity(&self) -> SecuritySeverity {
        match self {
            Self::BoundaryHeld => SecuritySeverity::Info,
            Self::BoundaryViolation => SecuritySeverity::Critical,
            Self::ProbeInconclusive => SecuritySeverity::Info,
            Self::ProbeTimedOut => SecuritySeverity::Warning,
            Self::ProbeCrashed => SecuritySeverity::Error,
            Self::CleanupOverran => SecuritySeverity::Warning,
            Self::DestructiveOrdering => SecuritySeverity::Warning,
            Self::ControlPassed => SecuritySeverity::Info,
            Self::ControlFailed => SecuritySeverity::Warning,
            Self::SuiteStarted => SecuritySeverity::Info,
            Self::SuiteFinished => SecuritySeverity::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BoundaryHeld => "boundary_held",
            Self::BoundaryViolation => "boundary_violation",
            Self::ProbeInconclusive => "probe_inconclusive",
            Self::ProbeTimedOut => "probe_timed_out",
            Self::ProbeCrashed => "probe_crashed",
            Self::CleanupOverran => "cleanup_overran",
            Self::DestructiveOrdering => "destructive_ordering",
            Self::ControlPassed => "control_passed",
            Self::ControlFailed => "control_failed",
            Self::SuiteStarted => "suite_started",
            Self::SuiteFinished => "suite_finished",
        }
    }

    /// Event for a control's outcome.
    pub fn for_control(kind: OutcomeKind) -> Self {
        if kind == OutcomeKind::Succeeded {
            Self::ControlPassed
        } else {
            Self::ControlFailed
        }
    }

    /// Event for a classified outcome. A timeout is reported as such unless it
    /// already counts as a held boundary.
    pub fn for_outcome(kind: OutcomeKind, raw: &RawResult) -> Self {
        match (kind, raw) {
            (OutcomeKind::Succeeded, _) => Self::BoundaryViolation,
            (OutcomeKind::Crashed, _) => Self::ProbeCrashed,
            (OutcomeKind::Blocked, _) => Self::BoundaryHeld,
            (OutcomeKind::Inconclusive, RawResult::TimedOut { .. }) => Self::ProbeTimedOut,
            (OutcomeKind::Inconclusive, _) => Self::ProbeInconclusive,
        }
    }
}

/// Severity levels for security events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecuritySeverity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl SecuritySeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Log a security event with structured details.
///
/// ```
/// use boundary_probe::telemetry::{log_security_event, SecurityEvent};
///
/// log_security_event(
///     SecurityEvent::BoundaryHeld,
///     "open refused after 200 descriptors",
///     &[("probe", "fd-ceiling"), ("category", "resource-limit")],
/// );
/// ```
pub fn log_security_event(event: SecurityEvent, message: &str, details: &[(&str, &str)]) {
    let severity = event.severity();
    let details = details
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ");

    macro_rules! emit {
        ($level:ident) => {
            tracing::$level!(
                security_event = event.as_str(),
                severity = severity.as_str(),
                details = %details,
                "{message}"
            )
        };
    }

    match severity {
        SecuritySeverity::Debug => emit!(debug),
        SecuritySeverity::Info => emit!(info),
        SecuritySeverity::Warning => emit!(warn),
        SecuritySeverity::Error | SecuritySeverity::Critical => emit!(error),
    }
}

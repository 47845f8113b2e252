// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Outcome classification.
//!
//! Pure mapping from `(category, raw result)` to an [`Outcome`]. Rules are
//! evaluated in fixed precedence: timeout, signal, panic, error, value.

use std::time::Duration;

use super::{AttemptStatus, FaultKind, Outcome, OutcomeKind, ProbeValue, RawResult};
use crate::probe::Category;

/// Fault kinds that count as "boundary held" for a category.
pub fn blocking_faults(category: Category) -> &'static [FaultKind] {
    match category {
        Category::Memory => &[FaultKind::ResourceExhausted, FaultKind::PermissionDenied],
        Category::ResourceLimit => &[FaultKind::ResourceExhausted, FaultKind::PermissionDenied],
        Category::Filesystem => &[
            FaultKind::PermissionDenied,
            FaultKind::ReadOnly,
            FaultKind::NotFound,
        ],
        Category::PrivilegedSyscall => &[FaultKind::PermissionDenied, FaultKind::NotFound],
        Category::ProcessControl => &[FaultKind::PermissionDenied, FaultKind::NotFound],
        Category::Network => &[
            FaultKind::ConnectionRefused,
            FaultKind::Unreachable,
            FaultKind::TimedOut,
            FaultKind::ConnectionReset,
            FaultKind::NotFound,
            FaultKind::PermissionDenied,
        ],
    }
}

/// Whether an expired budget means "no effect observed" for this category.
///
/// Destructive actions that never completed have an unknown effect.
fn timeout_holds(category: Category) -> bool {
    matches!(category, Category::Network | Category::ResourceLimit)
}

/// Classify a raw result for a probe of the given category.
pub fn classify(category: Category, raw: &RawResult, elapsed: Duration) -> Outcome {
    let (kind, explanation) = match raw {
        RawResult::TimedOut { budget_ms } => {
            if timeout_holds(category) {
                (
                    OutcomeKind::Blocked,
                    format!("no effect observed within {budget_ms}ms budget"),
                )
            } else {
                (
                    OutcomeKind::Inconclusive,
                    format!("action did not complete within {budget_ms}ms; effect unknown"),
                )
            }
        }
        RawResult::Signaled { signal } => {
            if category == Category::ProcessControl {
                (
                    OutcomeKind::Succeeded,
                    format!("signal {signal} delivery observed"),
                )
            } else {
                (
                    OutcomeKind::Crashed,
                    format!("probe terminated by signal {signal}"),
                )
            }
        }
        RawResult::Panicked { message } => (
            OutcomeKind::Crashed,
            format!("probe action panicked: {message}"),
        ),
        RawResult::Error(fault) if fault.kind == FaultKind::Unavailable => (
            OutcomeKind::Inconclusive,
            format!("operation could not be attempted ({fault})"),
        ),
        RawResult::Error(fault) => {
            if blocking_faults(category).contains(&fault.kind) {
                (OutcomeKind::Blocked, format!("operation denied ({fault})"))
            } else {
                (
                    OutcomeKind::Inconclusive,
                    format!("unrecognized failure ({fault})"),
                )
            }
        }
        RawResult::Value(value) => classify_value(category, value),
    };

    Outcome::new(kind, elapsed, explanation, raw.clone())
}

fn classify_value(category: Category, value: &ProbeValue) -> (OutcomeKind, String) {
    match value {
        ProbeValue::Exhaustion {
            unit,
            acquired,
            target,
            stopped_by,
            basis,
        } => {
            let (kind, explanation) = classify_exhaustion(category, unit, *acquired, *target, *stopped_by);
            match basis {
                Some(basis) => (kind, format!("{explanation} (target: {basis})")),
                None => (kind, explanation),
            }
        }
        ProbeValue::Attempts { attempts } => {
            let succeeded: Vec<&str> = attempts
                .iter()
                .filter(|a| a.status == AttemptStatus::Succeeded)
                .map(|a| a.target.as_str())
                .collect();
            let blocked = attempts
                .iter()
                .filter(|a| a.status == AttemptStatus::Blocked)
                .count();

            if !succeeded.is_empty() {
                (
                    OutcomeKind::Succeeded,
                    format!(
                        "{} of {} attempts succeeded: {}",
                        succeeded.len(),
                        attempts.len(),
                        succeeded.join(", ")
                    ),
                )
            } else if blocked > 0 {
                (
                    OutcomeKind::Blocked,
                    format!("{blocked} of {} attempts blocked", attempts.len()),
                )
            } else {
                (
                    OutcomeKind::Inconclusive,
                    format!("none of {} attempts could be classified", attempts.len()),
                )
            }
        }
        ProbeValue::Signals {
            visible,
            signaled,
            denied,
        } => {
            if *visible == 0 {
                (
                    OutcomeKind::Inconclusive,
                    "no other processes visible".to_string(),
                )
            } else if *signaled > 0 {
                (
                    OutcomeKind::Succeeded,
                    format!("signaled {signaled} of {visible} visible processes"),
                )
            } else if *denied > 0 {
                (
                    OutcomeKind::Blocked,
                    format!("all signals denied ({denied} of {visible} processes)"),
                )
            } else {
                (
                    OutcomeKind::Inconclusive,
                    format!("{visible} processes vanished before they could be signaled"),
                )
            }
        }
        ProbeValue::Exit { code } => {
            if *code == 0 {
                (OutcomeKind::Succeeded, "command completed successfully".to_string())
            } else {
                (
                    OutcomeKind::Inconclusive,
                    format!("command exited with status {code}"),
                )
            }
        }
    }
}

fn classify_exhaustion(
    category: Category,
    unit: &str,
    acquired: u64,
    target: u64,
    stopped_by: Option<FaultKind>,
) -> (OutcomeKind, String) {
    if target > 0 && acquired >= target {
        return (
            OutcomeKind::Succeeded,
            format!("acquired {acquired} of {target} {unit}; limit not enforced"),
        );
    }
    match stopped_by {
        Some(kind) if blocking_faults(category).contains(&kind) => (
            OutcomeKind::Blocked,
            format!("acquired {acquired} of {target} {unit} before {kind}"),
        ),
        Some(kind) => (
            OutcomeKind::Inconclusive,
            format!("acquired {acquired} of {target} {unit}, stopped by {kind}"),
        ),
        None => (
            OutcomeKind::Inconclusive,
            format!("acquired {acquired} of {target} {unit} without reaching a limit"),
        ),
    }
}

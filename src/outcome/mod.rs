// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Raw probe results and their classified outcomes.
//!
//! A probe's action produces exactly one [`RawResult`]. The classifier turns it
//! into an [`Outcome`], which keeps the raw result alongside for audit.

mod classifier;
mod fault;

pub use classifier::{blocking_faults, classify};
pub use fault::{FaultKind, ProbeFault};

use std::time::Duration;

use serde::{Serialize, Serializer};

/// Semantic result of one probe execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
pub enum OutcomeKind {
    /// The boundary held: the operation was denied or had no effect.
    Blocked,
    /// The boundary was crossed.
    Succeeded,
    /// The result could not be classified.
    Inconclusive,
    /// The harness failed, not the probed operation.
    Crashed,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocked => "blocked",
            Self::Succeeded => "succeeded",
            Self::Inconclusive => "inconclusive",
            Self::Crashed => "crashed",
        }
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unclassified product of running a probe's action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "variant", content = "detail", rename_all = "kebab-case")]
pub enum RawResult {
    /// The action returned a value.
    Value(ProbeValue),
    /// The action returned an error.
    Error(ProbeFault),
    /// The action did not finish within its budget.
    TimedOut { budget_ms: u64 },
    /// The action (or the process it drove) was terminated by a signal.
    Signaled { signal: i32 },
    /// The action panicked.
    Panicked { message: String },
}

impl RawResult {
    pub fn timed_out(budget: Duration) -> Self {
        Self::TimedOut {
            budget_ms: budget.as_millis() as u64,
        }
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Value(_) => "returned-value",
            Self::Error(_) => "returned-error",
            Self::TimedOut { .. } => "timed-out",
            Self::Signaled { .. } => "terminated-by-signal",
            Self::Panicked { .. } => "panicked",
        }
    }
}

impl From<ProbeFault> for RawResult {
    fn from(fault: ProbeFault) -> Self {
        Self::Error(fault)
    }
}

/// Typed payload of a returned value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ProbeValue {
    /// A resource was acquired repeatedly toward a target amount.
    Exhaustion {
        unit: String,
        acquired: u64,
        target: u64,
        stopped_by: Option<FaultKind>,
        /// How the target was chosen, when not given explicitly.
        #[serde(skip_serializing_if = "Option::is_none")]
        basis: Option<String>,
    },
    /// Several independent attempts against the same boundary.
    Attempts { attempts: Vec<Attempt> },
    /// Signals sent across the visible process table.
    Signals {
        visible: usize,
        signaled: usize,
        denied: usize,
    },
    /// An external command exited normally.
    Exit { code: i32 },
}

/// Result of one attempt inside a multi-variant probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptStatus {
    Blocked,
    Succeeded,
    Inconclusive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    pub target: String,
    pub status: AttemptStatus,
    pub detail: String,
}

impl Attempt {
    pub fn succeeded(target: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            status: AttemptStatus::Succeeded,
            detail: detail.into(),
        }
    }

    pub fn blocked(target: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            status: AttemptStatus::Blocked,
            detail: detail.into(),
        }
    }

    /// Denials and missing targets hold the boundary; anything else is unknown.
    pub fn from_fault(target: impl Into<String>, fault: &ProbeFault) -> Self {
        let status = match fault.kind {
            FaultKind::PermissionDenied | FaultKind::NotFound | FaultKind::ReadOnly => {
                AttemptStatus::Blocked
            }
            _ => AttemptStatus::Inconclusive,
        };
        Self {
            target: target.into(),
            status,
            detail: fault.to_string(),
        }
    }
}

/// Classified result of one probe execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub kind: OutcomeKind,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub explanation: String,
    pub raw: RawResult,
}

impl Outcome {
    pub fn new(kind: OutcomeKind, elapsed: Duration, explanation: impl Into<String>, raw: RawResult) -> Self {
        Self {
            kind,
            elapsed,
            explanation: explanation.into(),
            raw,
        }
    }
}

fn serialize_millis<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}

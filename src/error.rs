// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the probe harness.
//!
//! Three fault classes with different propagation rules:
//!
//! - [`ProbeFault`](crate::outcome::ProbeFault): the probed operation failed or
//!   was denied. Expected; it lives inside `RawResult::Error` and never leaves
//!   the Runner.
//! - [`HarnessFault`]: the Runner malfunctioned. Recorded as `Crashed` for the
//!   affected probe; the suite continues.
//! - [`ConfigError`]: the suite definition is malformed. Fails suite
//!   construction before any probe runs.

use std::path::PathBuf;

use thiserror::Error;

/// Malformed suite definition or runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read suite definition {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse suite definition: {0}")]
    Parse(String),

    #[error("Unknown probe identifier: {0}")]
    UnknownProbe(String),

    #[error("Unknown probe category: {0}")]
    UnknownCategory(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Duplicate probe name: {0}")]
    DuplicateProbe(String),

    #[error("Suite selects no probes")]
    EmptySuite,
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Malfunction of the harness itself, as opposed to the probed operation.
#[derive(Debug, Clone, Error)]
pub enum HarnessFault {
    #[error("probe worker was lost before reporting: {0}")]
    WorkerLost(String),

    #[error("cleanup did not finish within {bound_ms}ms")]
    CleanupOverran { bound_ms: u64 },

    #[error("worker pool closed before admission")]
    PoolClosed,
}

/// Top-level error returned to callers of the scheduler and CLI.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("configuration fault: {0}")]
    Configuration(#[from] ConfigError),

    #[error("harness fault: {0}")]
    Harness(#[from] HarnessFault),
}

impl HarnessError {
    /// Configuration faults are the only errors that stop a suite before it starts.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

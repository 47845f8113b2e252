// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommands for boundary-probe.
//!
//! ## Usage
//!
//! ```bash
//! boundary-probe run --suite suite.toml --journal run.jsonl
//! boundary-probe list           # built-in probes
//! boundary-probe env            # host snapshot
//! boundary-probe config show    # effective configuration
//! ```

pub mod config_cmd;
pub mod probes_cmd;
pub mod render;
pub mod run_cmd;

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::error::{ConfigError, HarnessError};
use crate::journal::JournalError;
use crate::verdict::Verdict;

pub const EXIT_ALL_HELD: u8 = 0;
pub const EXIT_VIOLATIONS: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_INDETERMINATE: u8 = 3;

/// Drive `future` to completion on a fresh multi-threaded runtime, then give
/// blocking workers at most `shutdown` before the runtime is abandoned.
///
/// A probe action that outlived its budget still occupies a blocking thread.
/// Dropping the runtime would wait for it indefinitely.
pub fn block_on_bounded<F: Future>(future: F, shutdown: Duration) -> io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(shutdown);
    Ok(output)
}

/// Process exit code for a verdict.
pub fn exit_code(verdict: Verdict) -> u8 {
    match verdict {
        Verdict::AllBoundariesHeld => EXIT_ALL_HELD,
        Verdict::BoundaryViolationsFound => EXIT_VIOLATIONS,
        Verdict::IndeterminateResults => EXIT_INDETERMINATE,
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("missing value for {0}")]
    MissingValue(String),

    #[error("unknown option: {0}")]
    UnknownOption(String),

    #[error(transparent)]
    Harness(#[from] HarnessError),

    #[error("journal: {0}")]
    Journal(#[from] JournalError),

    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Harness(HarnessError::Configuration(err))
    }
}

/// Options shared by the subcommands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub suite: Option<PathBuf>,
    pub journal: Option<PathBuf>,
    pub json: bool,
}

/// Parse `--suite FILE`, `--journal FILE` and `--json`.
pub fn parse_args(args: &[String]) -> Result<CliArgs, CliError> {
    let mut parsed = CliArgs::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--suite" | "-s" => {
                let value = iter.next().ok_or_else(|| CliError::MissingValue(arg.clone()))?;
                parsed.suite = Some(PathBuf::from(value));
            }
            "--journal" | "-j" => {
                let value = iter.next().ok_or_else(|| CliError::MissingValue(arg.clone()))?;
                parsed.journal = Some(PathBuf::from(value));
            }
            "--json" => parsed.json = true,
            other => return Err(CliError::UnknownOption(other.to_string())),
        }
    }
    Ok(parsed)
}

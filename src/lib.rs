// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! boundary-probe
//!
//! Runs adversarial probes inside an execution sandbox, classifies what
//! happened to each, and reduces the outcomes to one verdict about whether
//! the sandbox's boundaries held.
//!
//! # Pipeline
//!
//! - **Probe**: one adversarial operation against one boundary
//!   ([`probe::Probe`]). Produces a [`outcome::RawResult`].
//! - **Runner**: executes a probe under a time budget, contains panics and
//!   always runs cleanup ([`runner::ProbeRunner`]).
//! - **Classifier**: maps a raw result to blocked, succeeded, inconclusive
//!   or crashed ([`outcome::classify`]).
//! - **Scheduler**: runs a suite in order, or side-effect-free probes on a
//!   bounded worker pool ([`scheduler::SuiteScheduler`]).
//! - **Verdict**: reduces the outcomes to a [`verdict::Verdict`] and an
//!   immutable [`verdict::SuiteReport`].
//!
//! # Fault Classes
//!
//! A denied operation is a result, not an error. Harness malfunctions become
//! `Crashed` outcomes for the probe they hit. Only configuration faults stop
//! a suite, and they do so before any probe runs.

pub mod cli;
pub mod config;
pub mod environment;
pub mod error;
pub mod journal;
pub mod outcome;
pub mod probe;
pub mod runner;
pub mod scheduler;
pub mod telemetry;
pub mod verdict;

pub use config::{ProbeEntry, SandboxLimits, SuiteDefinition};
pub use error::{ConfigError, HarnessError, HarnessFault};
pub use outcome::{classify, Outcome, OutcomeKind, ProbeFault, RawResult};
pub use probe::{Category, Probe, ProbeContext, ProbeDescriptor};
pub use runner::{CleanupStatus, Execution, ProbeRunner, RunnerConfig};
pub use scheduler::{ScheduledProbe, Suite, SuiteOptions, SuiteScheduler};
pub use verdict::{aggregate, OutcomeCounts, ReportEntry, SuiteReport, Verdict};

// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Probe Runner: executes one probe under a wall-clock budget.
//!
//! The action runs on a blocking worker so a probe that never checks its
//! context still cannot hold the runner past its budget. On expiry the
//! context is cancelled, the action gets a short grace to stop, and cleanup
//! runs. Cleanup runs once per execution however the action ended; a cleanup
//! that overruns its bound is handed back to the caller to settle.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::config::{DEFAULT_CLEANUP_BOUND_MS, DEFAULT_CLEANUP_GRACE_MS};
use crate::error::HarnessFault;
use crate::outcome::{classify, Outcome, OutcomeKind, RawResult};
use crate::probe::{Probe, ProbeContext, ProbeDescriptor};
use crate::telemetry::{log_security_event, SecurityEvent};

/// Runner timing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    /// How long a timed-out action may keep running before cleanup starts.
    pub cleanup_grace: Duration,
    /// Upper bound on cleanup before it is reported as overrun.
    pub cleanup_bound: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            cleanup_grace: Duration::from_millis(DEFAULT_CLEANUP_GRACE_MS),
            cleanup_bound: Duration::from_millis(DEFAULT_CLEANUP_BOUND_MS),
        }
    }
}

/// How a probe's cleanup finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupStatus {
    Completed,
    Panicked,
    Overran,
}

/// Result of one probe execution.
#[derive(Debug)]
pub struct Execution {
    pub descriptor: ProbeDescriptor,
    pub raw: RawResult,
    pub elapsed: Duration,
    pub cleanup: CleanupStatus,
    /// Set when the harness, not the probed operation, failed.
    pub fault: Option<HarnessFault>,
    pending_cleanup: Option<JoinHandle<()>>,
}

impl Execution {
    /// Execution that never reached a worker.
    pub fn harness_failure(descriptor: ProbeDescriptor, fault: HarnessFault) -> Self {
        Self {
            descriptor,
            raw: RawResult::Panicked {
                message: fault.to_string(),
            },
            elapsed: Duration::ZERO,
            cleanup: CleanupStatus::Completed,
            fault: Some(fault),
            pending_cleanup: None,
        }
    }

    /// Classified outcome. Harness faults other than a slow cleanup are crashes.
    pub fn outcome(&self) -> Outcome {
        match &self.fault {
            Some(fault) if !matches!(fault, HarnessFault::CleanupOverran { .. }) => Outcome::new(
                OutcomeKind::Crashed,
                self.elapsed,
                format!("harness fault: {fault}"),
                self.raw.clone(),
            ),
            _ => classify(self.descriptor.category, &self.raw, self.elapsed),
        }
    }

    pub fn has_pending_cleanup(&self) -> bool {
        self.pending_cleanup.is_some()
    }

    /// Wait for an overrunning cleanup to finish.
    pub async fn settle(&mut self) {
        if let Some(handle) = self.pending_cleanup.take() {
            let started = Instant::now();
            if let Err(e) = handle.await {
                tracing::error!(probe = %self.descriptor.name, error = %e, "overrunning cleanup failed");
            }
            tracing::info!(
                probe = %self.descriptor.name,
                waited_ms = started.elapsed().as_millis() as u64,
                "overrunning cleanup settled"
            );
        }
    }
}

/// Runs `cleanup` on drop unless disarmed, so an execution abandoned mid-way
/// still releases the probe's resources.
struct CleanupGuard {
    probe: Option<Arc<dyn Probe>>,
}

impl CleanupGuard {
    fn new(probe: Arc<dyn Probe>) -> Self {
        Self { probe: Some(probe) }
    }

    fn disarm(&mut self) -> Option<Arc<dyn Probe>> {
        self.probe.take()
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if let Some(probe) = self.probe.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn_blocking(move || probe.cleanup());
                }
                Err(_) => probe.cleanup(),
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

fn join_failure(err: JoinError) -> (RawResult, Option<HarnessFault>) {
    if err.is_panic() {
        let message = panic_message(err.into_panic().as_ref());
        (RawResult::Panicked { message }, None)
    } else {
        let fault = HarnessFault::WorkerLost(err.to_string());
        (
            RawResult::Panicked {
                message: fault.to_string(),
            },
            Some(fault),
        )
    }
}

/// Executes single probes with enforced budgets and guaranteed cleanup.
#[derive(Debug, Clone, Default)]
pub struct ProbeRunner {
    config: RunnerConfig,
}

impl ProbeRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> RunnerConfig {
        self.config
    }

    /// Run `probe` within `budget`. Returns within `budget + cleanup_grace +
    /// cleanup_bound`.
    pub async fn execute(&self, probe: Arc<dyn Probe>, budget: Duration) -> Execution {
        let descriptor = probe.describe();
        let token = CancellationToken::new();
        let ctx = ProbeContext::new(budget, token.clone());
        let mut guard = CleanupGuard::new(probe.clone());

        tracing::debug!(probe = %descriptor.name, budget_ms = budget.as_millis() as u64, "probe started");
        let started = Instant::now();
        let mut worker = {
            let probe = probe.clone();
            tokio::task::spawn_blocking(move || probe.run(&ctx))
        };

        let (raw, fault) = match tokio::time::timeout(budget, &mut worker).await {
            Ok(Ok(raw)) => (raw, None),
            Ok(Err(e)) => join_failure(e),
            Err(_) => {
                token.cancel();
                let stopped = tokio::time::timeout(self.config.cleanup_grace, &mut worker)
                    .await
                    .is_ok();
                tracing::warn!(
                    probe = %descriptor.name,
                    budget_ms = budget.as_millis() as u64,
                    stopped_in_grace = stopped,
                    "probe budget expired"
                );
                (RawResult::timed_out(budget), None)
            }
        };
        let elapsed = started.elapsed();

        let (cleanup, pending_cleanup) = match guard.disarm() {
            Some(probe) => self.cleanup(&descriptor, probe).await,
            None => (CleanupStatus::Completed, None),
        };
        let fault = match (fault, cleanup) {
            (Some(fault), _) => Some(fault),
            (None, CleanupStatus::Overran) => Some(HarnessFault::CleanupOverran {
                bound_ms: self.config.cleanup_bound.as_millis() as u64,
            }),
            (None, _) => None,
        };

        tracing::debug!(
            probe = %descriptor.name,
            result = raw.variant_name(),
            elapsed_ms = elapsed.as_millis() as u64,
            cleanup = ?cleanup,
            "probe finished"
        );
        Execution {
            descriptor,
            raw,
            elapsed,
            cleanup,
            fault,
            pending_cleanup,
        }
    }

    async fn cleanup(
        &self,
        descriptor: &ProbeDescriptor,
        probe: Arc<dyn Probe>,
    ) -> (CleanupStatus, Option<JoinHandle<()>>) {
        let mut handle = tokio::task::spawn_blocking(move || probe.cleanup());
        match tokio::time::timeout(self.config.cleanup_bound, &mut handle).await {
            Ok(Ok(())) => (CleanupStatus::Completed, None),
            Ok(Err(e)) => {
                tracing::error!(probe = %descriptor.name, error = %e, "cleanup panicked");
                (CleanupStatus::Panicked, None)
            }
            Err(_) => {
                let bound_ms = self.config.cleanup_bound.as_millis().to_string();
                log_security_event(
                    SecurityEvent::CleanupOverran,
                    "probe cleanup exceeded its bound",
                    &[("probe", descriptor.name.as_str()), ("bound_ms", bound_ms.as_str())],
                );
                (CleanupStatus::Overran, Some(handle))
            }
        }
    }
}

// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Probe contract and built-in probes.
//!
//! A probe is one adversarial operation against one sandbox boundary. Probes
//! run synchronously on a blocking worker owned by the
//! [`ProbeRunner`](crate::runner::ProbeRunner); the runner enforces the budget
//! and guarantees [`Probe::cleanup`] runs once per invocation.

pub mod command;
pub mod descriptors;
pub mod egress;
pub mod filesystem;
mod held;
pub mod listen;
pub mod memory;
pub mod privileged;
pub mod process;
pub mod registry;

pub use command::CommandProbe;
pub use descriptors::{DescriptorSource, FdLimitProbe, ScratchFiles};
pub use egress::EgressProbe;
pub use filesystem::{FsWriteProbe, ScratchProbe};
pub use held::Held;
pub use listen::ListenProbe;
pub use memory::{ChunkAllocator, HeapAllocator, MemoryProbe};
pub use privileged::{PrivilegedProbe, PrivilegedVariant};
pub use process::{ProcFs, ProcessEntry, ProcessProbe, ProcessTable, SignalMode};
pub use registry::{build_probe, default_suite, BUILTIN_PROBES};

use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ConfigError;
use crate::outcome::{OutcomeKind, RawResult};

/// Boundary category a probe exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Memory,
    Filesystem,
    ProcessControl,
    PrivilegedSyscall,
    Network,
    ResourceLimit,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Self::Memory,
        Self::Filesystem,
        Self::ProcessControl,
        Self::PrivilegedSyscall,
        Self::Network,
        Self::ResourceLimit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Filesystem => "filesystem",
            Self::ProcessControl => "process-control",
            Self::PrivilegedSyscall => "privileged-syscall",
            Self::Network => "network",
            Self::ResourceLimit => "resource-limit",
        }
    }

    /// Categories whose probes may leave the host unusable if they succeed.
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::ProcessControl | Self::PrivilegedSyscall)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownCategory(s.to_string()))
    }
}

/// Identity and declared expectations of a probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeDescriptor {
    pub name: String,
    pub category: Category,
    /// Expected outcome, for reporting only.
    pub expected: Option<OutcomeKind>,
    /// Safe to run alongside other probes.
    pub side_effect_free: bool,
    /// Checks an operation the sandbox must allow. Left out of the boundary
    /// counts; a control that does not succeed makes held results suspect.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub control: bool,
}

impl ProbeDescriptor {
    pub fn new(name: impl Into<String>, category: Category) -> Self {
        Self {
            name: name.into(),
            category,
            expected: Some(OutcomeKind::Blocked),
            side_effect_free: false,
            control: false,
        }
    }

    /// Mark as a control, expected to succeed.
    pub fn control(mut self) -> Self {
        self.control = true;
        self.expected = Some(OutcomeKind::Succeeded);
        self
    }

    pub fn expecting(mut self, expected: Option<OutcomeKind>) -> Self {
        self.expected = expected;
        self
    }

    pub fn side_effect_free(mut self) -> Self {
        self.side_effect_free = true;
        self
    }
}

/// Execution context handed to [`Probe::run`].
#[derive(Debug, Clone)]
pub struct ProbeContext {
    budget: Duration,
    deadline: Instant,
    cancel: CancellationToken,
}

impl ProbeContext {
    pub fn new(budget: Duration, cancel: CancellationToken) -> Self {
        Self {
            budget,
            deadline: Instant::now() + budget,
            cancel,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// True once the runner gave up on this invocation or the deadline passed.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || Instant::now() >= self.deadline
    }

    /// Raw result for a probe that noticed its own budget ran out.
    pub fn timed_out(&self) -> RawResult {
        RawResult::timed_out(self.budget)
    }
}

/// A unit of adversarial work against one sandbox boundary.
pub trait Probe: Send + Sync {
    /// Identity of the probe. Pure.
    fn describe(&self) -> ProbeDescriptor;

    /// Perform the adversarial action.
    ///
    /// Cancellable work must check [`ProbeContext::is_cancelled`]; blocking
    /// syscalls are bounded by the runner instead.
    fn run(&self, ctx: &ProbeContext) -> RawResult;

    /// Release everything `run` acquired. Idempotent; must not panic.
    fn cleanup(&self);
}

// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Process-control probe.
//!
//! Enumerates visible processes and tries to signal every one except itself.

use std::path::PathBuf;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde::Deserialize;

use super::{Category, Probe, ProbeContext, ProbeDescriptor};
use crate::outcome::{FaultKind, ProbeFault, ProbeValue, RawResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: i32,
    pub name: String,
}

/// View of the process table.
pub trait ProcessTable: Send + Sync {
    fn list(&self) -> Result<Vec<ProcessEntry>, ProbeFault>;

    /// Send `signal` to `pid`; `None` only checks permission.
    fn signal(&self, pid: i32, signal: Option<Signal>) -> Result<(), ProbeFault>;

    fn current_pid(&self) -> i32 {
        std::process::id() as i32
    }
}

/// Process table read from procfs.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcessTable for ProcFs {
    fn list(&self) -> Result<Vec<ProcessEntry>, ProbeFault> {
        let entries = std::fs::read_dir(&self.root)
            .map_err(|e| ProbeFault::from_io(&format!("list {}", self.root.display()), &e))?;

        let mut processes = Vec::new();
        for entry in entries.flatten() {
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<i32>().ok()) else {
                continue;
            };
            let name = std::fs::read_to_string(entry.path().join("comm"))
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|_| "unknown".to_string());
            processes.push(ProcessEntry { pid, name });
        }
        processes.sort_by_key(|p| p.pid);
        Ok(processes)
    }

    fn signal(&self, pid: i32, signal: Option<Signal>) -> Result<(), ProbeFault> {
        kill(Pid::from_raw(pid), signal)
            .map_err(|errno| ProbeFault::from_errno(&format!("kill {pid}"), errno))
    }
}

/// How hard the probe pushes against each process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalMode {
    /// Permission check only (signal 0); nothing is delivered.
    Check,
    /// SIGTERM, falling back to SIGKILL.
    #[default]
    Terminate,
}

pub struct ProcessProbe {
    name: String,
    mode: SignalMode,
    table: Box<dyn ProcessTable>,
}

impl ProcessProbe {
    pub fn new(mode: SignalMode) -> Self {
        Self::with_table(mode, Box::new(ProcFs::default()))
    }

    pub fn with_table(mode: SignalMode, table: Box<dyn ProcessTable>) -> Self {
        Self {
            name: "process-kill".to_string(),
            mode,
            table,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn signal_one(&self, pid: i32) -> Result<(), ProbeFault> {
        match self.mode {
            SignalMode::Check => self.table.signal(pid, None),
            SignalMode::Terminate => self
                .table
                .signal(pid, Some(Signal::SIGTERM))
                .or_else(|_| self.table.signal(pid, Some(Signal::SIGKILL))),
        }
    }
}

impl Probe for ProcessProbe {
    fn describe(&self) -> ProbeDescriptor {
        ProbeDescriptor::new(&self.name, Category::ProcessControl)
    }

    fn run(&self, ctx: &ProbeContext) -> RawResult {
        let processes = match self.table.list() {
            Ok(p) => p,
            Err(fault) => return RawResult::Error(fault),
        };
        let own_pid = self.table.current_pid();
        let targets: Vec<&ProcessEntry> = processes.iter().filter(|p| p.pid != own_pid).collect();

        let mut signaled = 0;
        let mut denied = 0;
        for process in &targets {
            if ctx.is_cancelled() {
                return ctx.timed_out();
            }
            match self.signal_one(process.pid) {
                Ok(()) => {
                    signaled += 1;
                    tracing::debug!(probe = %self.name, pid = process.pid, name = %process.name, "signal delivered");
                }
                // Exited between listing and signaling.
                Err(fault) if fault.kind == FaultKind::NotFound => {}
                Err(fault) => {
                    denied += 1;
                    tracing::trace!(probe = %self.name, pid = process.pid, error = %fault, "signal refused");
                }
            }
        }

        RawResult::Value(ProbeValue::Signals {
            visible: targets.len(),
            signaled,
            denied,
        })
    }

    // Signals cannot be taken back; nothing is held.
    fn cleanup(&self) {}
}

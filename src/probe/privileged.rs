// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Privileged-operation probe: reboot commands, signal to init, sysrq writes.
//!
//! Each variant is attempted in turn. If one of them succeeds on an
//! unconfined host the machine goes down, so suites should run this probe
//! last and keep a journal.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::process::Child;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::{getpid, Pid};

use super::command::{reap, spawn_quiet, wait_with_deadline};
use super::{Category, Held, Probe, ProbeContext, ProbeDescriptor};
use crate::outcome::{Attempt, AttemptStatus, ProbeFault, ProbeValue, RawResult};

/// Per-command limit, independent of the remaining probe budget.
const COMMAND_LIMIT: Duration = Duration::from_secs(10);

pub const SYSRQ_TRIGGER: &str = "/proc/sysrq-trigger";
pub const SYSRQ_SYSCTL: &str = "/proc/sys/kernel/sysrq";

/// One way of attempting a privileged action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivilegedVariant {
    /// Run a command; exit status 0 means it was accepted.
    Command {
        label: String,
        program: String,
        args: Vec<String>,
    },
    /// Send a signal to pid 1.
    SignalInit { signal: Signal },
    /// Write the reboot key to a sysrq trigger file.
    SysrqWrite { trigger: PathBuf },
    /// Enable sysrq through its sysctl, then trigger it.
    MagicSysrq { sysctl: PathBuf, trigger: PathBuf },
}

impl PrivilegedVariant {
    pub fn command(label: &str, program: &str, args: &[&str]) -> Self {
        Self::Command {
            label: label.to_string(),
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Command { label, .. } => label.clone(),
            Self::SignalInit { signal } => format!("{signal} to init"),
            Self::SysrqWrite { trigger } => format!("write to {}", trigger.display()),
            Self::MagicSysrq { .. } => "magic sysrq".to_string(),
        }
    }

    /// Reboot paths a process can reach from userspace.
    pub fn standard() -> Vec<Self> {
        vec![
            Self::command("systemctl reboot", "systemctl", &["reboot"]),
            Self::command("shutdown -r now", "shutdown", &["-r", "now"]),
            Self::command("init 6", "init", &["6"]),
            Self::command("telinit 6", "telinit", &["6"]),
            Self::command("halt -r", "halt", &["-r"]),
            Self::command("poweroff -r", "poweroff", &["-r"]),
            Self::command("sudo reboot", "sudo", &["-n", "reboot"]),
            Self::command("reboot", "reboot", &[]),
            Self::SignalInit {
                signal: Signal::SIGTERM,
            },
            Self::SysrqWrite {
                trigger: PathBuf::from(SYSRQ_TRIGGER),
            },
            Self::MagicSysrq {
                sysctl: PathBuf::from(SYSRQ_SYSCTL),
                trigger: PathBuf::from(SYSRQ_TRIGGER),
            },
        ]
    }
}

fn write_file(path: &PathBuf, data: &[u8]) -> Result<(), ProbeFault> {
    let context = format!("write {}", path.display());
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| ProbeFault::from_io(&context, &e))?;
    file.write_all(data)
        .map_err(|e| ProbeFault::from_io(&context, &e))
}

pub struct PrivilegedProbe {
    name: String,
    variants: Vec<PrivilegedVariant>,
    children: Held<Child>,
}

impl PrivilegedProbe {
    pub fn new(variants: Vec<PrivilegedVariant>) -> Self {
        Self {
            name: "privileged-ops".to_string(),
            variants,
            children: Held::new(),
        }
    }

    pub fn standard() -> Self {
        Self::new(PrivilegedVariant::standard())
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn variants(&self) -> &[PrivilegedVariant] {
        &self.variants
    }

    fn attempt(&self, variant: &PrivilegedVariant, ctx: &ProbeContext) -> Attempt {
        let label = variant.label();
        match variant {
            PrivilegedVariant::Command { program, args, .. } => {
                self.attempt_command(label, program, args, ctx)
            }
            PrivilegedVariant::SignalInit { signal } => {
                if getpid() == Pid::from_raw(1) {
                    return Attempt {
                        target: label,
                        status: AttemptStatus::Inconclusive,
                        detail: "probe is running as pid 1".to_string(),
                    };
                }
                match kill(Pid::from_raw(1), *signal) {
                    Ok(()) => Attempt::succeeded(label, format!("sent {signal} to pid 1")),
                    Err(errno) => Attempt::from_fault(label, &ProbeFault::from_errno("kill 1", errno)),
                }
            }
            PrivilegedVariant::SysrqWrite { trigger } => match write_file(trigger, b"b") {
                Ok(()) => Attempt::succeeded(label, "trigger accepted write"),
                Err(fault) => Attempt::from_fault(label, &fault),
            },
            PrivilegedVariant::MagicSysrq { sysctl, trigger } => {
                match write_file(sysctl, b"1").and_then(|()| write_file(trigger, b"b")) {
                    Ok(()) => Attempt::succeeded(label, "sysrq enabled and triggered"),
                    Err(fault) => Attempt::from_fault(label, &fault),
                }
            }
        }
    }

    fn attempt_command(
        &self,
        label: String,
        program: &str,
        args: &[String],
        ctx: &ProbeContext,
    ) -> Attempt {
        let child = match spawn_quiet(program, args) {
            Ok(child) => child,
            Err(e) => return Attempt::from_fault(label, &ProbeFault::from_io(&format!("spawn {program}"), &e)),
        };
        let pid = child.id();
        if let Err(mut child) = self.children.hold(child) {
            reap(&mut child);
            return Attempt {
                target: label,
                status: AttemptStatus::Inconclusive,
                detail: "released before start".to_string(),
            };
        }

        let waited = self.children.inspect_mut(|children| {
            children
                .iter_mut()
                .find(|c| c.id() == pid)
                .map(|c| wait_with_deadline(c, ctx, COMMAND_LIMIT))
        });

        match waited {
            Some(Ok(Some(status))) if status.success() => {
                Attempt::succeeded(label, "command exited with status 0")
            }
            Some(Ok(Some(status))) => match status.code() {
                Some(code) => Attempt::blocked(label, format!("command exited with status {code}")),
                None => Attempt {
                    target: label,
                    status: AttemptStatus::Inconclusive,
                    detail: format!("command terminated abnormally ({status})"),
                },
            },
            Some(Ok(None)) => Attempt {
                target: label,
                status: AttemptStatus::Inconclusive,
                detail: "command did not finish in time".to_string(),
            },
            Some(Err(e)) => Attempt::from_fault(label, &ProbeFault::from_io("wait", &e)),
            None => Attempt {
                target: label,
                status: AttemptStatus::Inconclusive,
                detail: "released while running".to_string(),
            },
        }
    }
}

impl Probe for PrivilegedProbe {
    fn describe(&self) -> ProbeDescriptor {
        ProbeDescriptor::new(&self.name, Category::PrivilegedSyscall)
    }

    fn run(&self, ctx: &ProbeContext) -> RawResult {
        self.children.open();
        let mut attempts = Vec::with_capacity(self.variants.len());

        for variant in &self.variants {
            if ctx.is_cancelled() {
                return ctx.timed_out();
            }
            let attempt = self.attempt(variant, ctx);
            tracing::debug!(
                probe = %self.name,
                variant = %attempt.target,
                status = ?attempt.status,
                detail = %attempt.detail,
                "privileged attempt"
            );
            attempts.push(attempt);
        }

        RawResult::Value(ProbeValue::Attempts { attempts })
    }

    fn cleanup(&self) {
        for mut child in self.children.release() {
            reap(&mut child);
        }
    }
}

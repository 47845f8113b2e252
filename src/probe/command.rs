// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! External command probe.
//!
//! Runs an external program (for example a standalone probe script) as a
//! child process under the probe budget. Also hosts the child-process helpers
//! shared with the privileged-operation probe.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::{Category, Held, Probe, ProbeContext, ProbeDescriptor};
use crate::outcome::{FaultKind, OutcomeKind, ProbeFault, ProbeValue, RawResult};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Shell convention: command found but not executable.
const EXIT_NOT_EXECUTABLE: i32 = 126;
/// Shell convention: command not found.
const EXIT_NOT_FOUND: i32 = 127;

/// Spawn a child with output discarded.
pub(crate) fn spawn_quiet(program: &str, args: &[String]) -> io::Result<Child> {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
}

/// Wait for `child` until it exits, `limit` passes, or the context is cancelled.
///
/// Returns `Ok(None)` when the wait was cut short; the child is still running.
pub(crate) fn wait_with_deadline(
    child: &mut Child,
    ctx: &ProbeContext,
    limit: Duration,
) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + limit.min(ctx.remaining());
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if ctx.is_cancelled() || Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Spawn a child whose stdout is piped back to the probe.
pub(crate) fn spawn_reporting(program: &str, args: &[String]) -> io::Result<Child> {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
}

/// Kill and reap a child. Already-exited children are only reaped.
pub(crate) fn reap(child: &mut Child) {
    if let Ok(None) = child.try_wait() {
        let _ = child.kill();
    }
    let _ = child.wait();
}

pub(crate) enum Waited {
    Exited(ExitStatus),
    Failed(io::Error),
    /// Budget spent, or cleanup already took the child.
    Expired,
}

/// Poll the held child `pid` until it exits or the context runs out.
pub(crate) fn wait_held(children: &Held<Child>, pid: u32, ctx: &ProbeContext) -> Waited {
    loop {
        let polled = children.inspect_mut(|children| {
            children
                .iter_mut()
                .find(|c| c.id() == pid)
                .map(|c| c.try_wait())
        });
        match polled {
            Some(Ok(Some(status))) => return Waited::Exited(status),
            Some(Ok(None)) => {}
            Some(Err(e)) => return Waited::Failed(e),
            None => return Waited::Expired,
        }
        if ctx.is_cancelled() {
            return Waited::Expired;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

pub struct CommandProbe {
    name: String,
    category: Category,
    expected: Option<OutcomeKind>,
    program: String,
    args: Vec<String>,
    children: Held<Child>,
}

impl CommandProbe {
    pub fn new(name: impl Into<String>, category: Category, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category,
            expected: Some(OutcomeKind::Blocked),
            program: program.into(),
            args: Vec::new(),
            children: Held::new(),
        }
    }

    pub fn args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn expecting(mut self, expected: Option<OutcomeKind>) -> Self {
        self.expected = expected;
        self
    }

    pub fn running_children(&self) -> usize {
        self.children.len()
    }

    fn exit_result(&self, status: ExitStatus) -> RawResult {
        if let Some(signal) = status.signal() {
            return RawResult::Signaled { signal };
        }
        match status.code() {
            Some(0) => RawResult::Value(ProbeValue::Exit { code: 0 }),
            Some(EXIT_NOT_EXECUTABLE) => ProbeFault::new(
                FaultKind::PermissionDenied,
                format!("{} is not executable", self.program),
            )
            .with_code(EXIT_NOT_EXECUTABLE)
            .into(),
            Some(EXIT_NOT_FOUND) => ProbeFault::new(
                FaultKind::NotFound,
                format!("{} not found", self.program),
            )
            .with_code(EXIT_NOT_FOUND)
            .into(),
            Some(code) => ProbeFault::new(
                FaultKind::Other,
                format!("{} exited with status {code}", self.program),
            )
            .with_code(code)
            .into(),
            None => ProbeFault::new(FaultKind::Other, "exit status unavailable").into(),
        }
    }
}

impl Probe for CommandProbe {
    fn describe(&self) -> ProbeDescriptor {
        ProbeDescriptor::new(&self.name, self.category).expecting(self.expected)
    }

    fn run(&self, ctx: &ProbeContext) -> RawResult {
        self.children.open();
        // A program that cannot be started says nothing about the sandbox.
        let child = match spawn_quiet(&self.program, &self.args) {
            Ok(child) => child,
            Err(e) => return ProbeFault::unavailable(&format!("spawn {}", self.program), &e).into(),
        };
        let pid = child.id();
        if let Err(mut child) = self.children.hold(child) {
            reap(&mut child);
            return ctx.timed_out();
        }
        tracing::debug!(probe = %self.name, pid, program = %self.program, "command started");

        match wait_held(&self.children, pid, ctx) {
            Waited::Exited(status) => self.exit_result(status),
            Waited::Failed(e) => ProbeFault::from_io("wait for command", &e).into(),
            Waited::Expired => ctx.timed_out(),
        }
    }

    fn cleanup(&self) {
        for mut child in self.children.release() {
            reap(&mut child);
        }
    }
}

// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Memory-ceiling probe.
//!
//! Acquires and fully writes memory in chunks until a target far above the
//! declared ceiling is reached or an allocation is refused.
//!
//! Under a cgroup ceiling the kernel answers an over-limit page fault by
//! killing the faulting process, so the built-in suite allocates in a child:
//! the binary re-executes itself with [`ALLOCATE_COMMAND`], and the child
//! reports progress as JSON lines on stdout. A child killed with `SIGKILL`
//! counts as a refused allocation at the last reported amount.

use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, ChildStdout, ExitStatus};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};

use super::command::{reap, spawn_reporting, wait_held, Waited};
use super::{Category, Held, Probe, ProbeContext, ProbeDescriptor};
use crate::outcome::{FaultKind, ProbeFault, ProbeValue, RawResult};

/// Byte written into every acquired page so the memory is actually committed.
const FILL_BYTE: u8 = b'X';

/// Default target when no ceiling is declared: 2 GiB.
pub const DEFAULT_TARGET_BYTES: u64 = 2 * 1024 * 1024 * 1024;

pub const DEFAULT_CHUNK_BYTES: usize = 16 * 1024 * 1024;

/// Hidden subcommand that runs [`allocate_main`].
pub const ALLOCATE_COMMAND: &str = "__allocate";

/// How long to wait for progress lines still in the pipe after the child exits.
const PROGRESS_DRAIN: Duration = Duration::from_millis(100);

/// Source of committed memory blocks.
pub trait ChunkAllocator: Send + Sync {
    /// Allocate and write `len` bytes.
    fn allocate(&self, len: usize) -> Result<Vec<u8>, ProbeFault>;
}

/// Fallible heap reservation followed by a full write.
#[derive(Debug, Default)]
pub struct HeapAllocator;

impl ChunkAllocator for HeapAllocator {
    fn allocate(&self, len: usize) -> Result<Vec<u8>, ProbeFault> {
        let mut block = Vec::new();
        block.try_reserve_exact(len).map_err(|e| {
            ProbeFault::new(
                FaultKind::ResourceExhausted,
                format!("reserve {len} bytes: {e}"),
            )
            .with_code(Errno::ENOMEM as i32)
        })?;
        block.resize(len, FILL_BYTE);
        Ok(block)
    }
}

/// One progress line written by an allocating child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationProgress {
    pub acquired: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_by: Option<FaultKind>,
    #[serde(default)]
    pub finished: bool,
}

fn report_progress(out: &mut impl Write, progress: AllocationProgress) -> io::Result<()> {
    serde_json::to_writer(&mut *out, &progress)?;
    out.write_all(b"\n")?;
    out.flush()
}

/// Allocate toward `target`, writing one progress line per chunk. Blocks stay
/// held until the function returns.
pub fn allocate_into(
    out: &mut impl Write,
    allocator: &dyn ChunkAllocator,
    target: u64,
    chunk_bytes: usize,
) -> io::Result<AllocationProgress> {
    let mut blocks = Vec::new();
    let mut acquired: u64 = 0;
    while acquired < target {
        let len = (target - acquired).min(chunk_bytes.max(1) as u64) as usize;
        match allocator.allocate(len) {
            Ok(block) => {
                blocks.push(block);
                acquired += len as u64;
                report_progress(out, AllocationProgress { acquired, stopped_by: None, finished: false })?;
            }
            Err(fault) => {
                let last = AllocationProgress {
                    acquired,
                    stopped_by: Some(fault.kind),
                    finished: true,
                };
                report_progress(out, last)?;
                return Ok(last);
            }
        }
    }
    let last = AllocationProgress {
        acquired,
        stopped_by: None,
        finished: true,
    };
    report_progress(out, last)?;
    Ok(last)
}

/// Entry point of the allocating child: `__allocate <target-bytes> <chunk-bytes>`.
pub fn allocate_main(args: &[String]) -> u8 {
    let parsed = match args {
        [target, chunk] => target.parse::<u64>().ok().zip(chunk.parse::<usize>().ok()),
        _ => None,
    };
    let Some((target, chunk)) = parsed else {
        eprintln!("usage: {ALLOCATE_COMMAND} <target-bytes> <chunk-bytes>");
        return 2;
    };
    let stdout = io::stdout();
    match allocate_into(&mut stdout.lock(), &HeapAllocator, target, chunk) {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

/// Collect progress lines on a background thread.
fn watch_progress(stdout: ChildStdout) -> Receiver<AllocationProgress> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in BufReader::new(stdout).lines() {
            let Ok(line) = line else { break };
            if let Ok(progress) = serde_json::from_str::<AllocationProgress>(&line) {
                if tx.send(progress).is_err() {
                    break;
                }
            }
        }
    });
    rx
}

fn last_progress(rx: &Receiver<AllocationProgress>) -> Option<AllocationProgress> {
    let mut last = None;
    while let Ok(progress) = rx.recv_timeout(PROGRESS_DRAIN) {
        last = Some(progress);
    }
    last
}

enum Isolation {
    InProcess(Box<dyn ChunkAllocator>),
    /// `args` precede `<target-bytes> <chunk-bytes>`.
    Child { program: String, args: Vec<String> },
}

pub struct MemoryProbe {
    name: String,
    target_bytes: u64,
    chunk_bytes: usize,
    basis: Option<String>,
    isolation: Isolation,
    held: Held<Vec<u8>>,
    children: Held<Child>,
}

impl MemoryProbe {
    /// Allocate inside the calling process.
    pub fn new(target_bytes: u64) -> Self {
        Self::with_allocator(target_bytes, Box::new(HeapAllocator))
    }

    pub fn with_allocator(target_bytes: u64, allocator: Box<dyn ChunkAllocator>) -> Self {
        Self {
            name: "memory-ceiling".to_string(),
            target_bytes,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            basis: None,
            isolation: Isolation::InProcess(allocator),
            held: Held::new(),
            children: Held::new(),
        }
    }

    /// Target twice the declared ceiling, or the 2 GiB default.
    pub fn for_ceiling(ceiling_bytes: Option<u64>) -> Self {
        match ceiling_bytes {
            Some(ceiling) => {
                let mut probe = Self::new(ceiling.saturating_mul(2));
                probe.basis = Some(format!("twice the declared ceiling of {ceiling} bytes"));
                probe
            }
            None => {
                let mut probe = Self::new(DEFAULT_TARGET_BYTES);
                probe.basis = Some("default, no ceiling declared".to_string());
                probe
            }
        }
    }

    /// Allocate in `program args.. <target> <chunk>` instead of in-process.
    pub fn in_child(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.isolation = Isolation::Child {
            program: program.into(),
            args,
        };
        self
    }

    /// Allocate in a re-executed copy of the running binary.
    pub fn isolated(self) -> Self {
        match std::env::current_exe() {
            Ok(exe) => {
                let program = exe.to_string_lossy().into_owned();
                self.in_child(program, vec![ALLOCATE_COMMAND.to_string()])
            }
            Err(e) => {
                tracing::warn!(probe = %self.name, error = %e, "cannot locate own binary, allocating in-process");
                self
            }
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes.max(1);
        self
    }

    pub fn target_bytes(&self) -> u64 {
        self.target_bytes
    }

    pub fn is_isolated(&self) -> bool {
        matches!(self.isolation, Isolation::Child { .. })
    }

    /// Bytes currently held in-process by the in-flight invocation.
    pub fn held_bytes(&self) -> u64 {
        self.held
            .inspect(|blocks| blocks.iter().map(|b| b.len() as u64).sum())
    }

    pub fn running_children(&self) -> usize {
        self.children.len()
    }

    fn exhaustion(&self, acquired: u64, stopped_by: Option<FaultKind>) -> RawResult {
        RawResult::Value(ProbeValue::Exhaustion {
            unit: "bytes".to_string(),
            acquired,
            target: self.target_bytes,
            stopped_by,
            basis: self.basis.clone(),
        })
    }

    fn run_in_process(&self, allocator: &dyn ChunkAllocator, ctx: &ProbeContext) -> RawResult {
        let target = self.target_bytes;
        let mut acquired: u64 = 0;

        while acquired < target {
            if ctx.is_cancelled() {
                return ctx.timed_out();
            }
            let len = (target - acquired).min(self.chunk_bytes as u64) as usize;
            match allocator.allocate(len) {
                Ok(block) => {
                    if self.held.hold(block).is_err() {
                        return ctx.timed_out();
                    }
                    acquired += len as u64;
                }
                Err(fault) => {
                    tracing::debug!(probe = %self.name, acquired, error = %fault, "allocation refused");
                    return self.exhaustion(acquired, Some(fault.kind));
                }
            }
        }
        self.exhaustion(acquired, None)
    }

    fn run_in_child(&self, program: &str, args: &[String], ctx: &ProbeContext) -> RawResult {
        let mut args = args.to_vec();
        args.push(self.target_bytes.to_string());
        args.push(self.chunk_bytes.to_string());

        let mut child = match spawn_reporting(program, &args) {
            Ok(child) => child,
            Err(e) => return ProbeFault::unavailable(&format!("spawn {program}"), &e).into(),
        };
        let pid = child.id();
        let progress = child.stdout.take().map(watch_progress);
        if let Err(mut child) = self.children.hold(child) {
            reap(&mut child);
            return ctx.timed_out();
        }

        let status = match wait_held(&self.children, pid, ctx) {
            Waited::Exited(status) => status,
            Waited::Failed(e) => return ProbeFault::from_io("wait for allocation child", &e).into(),
            Waited::Expired => return ctx.timed_out(),
        };
        let last = progress.as_ref().and_then(last_progress);
        self.child_result(status, last)
    }

    fn child_result(&self, status: ExitStatus, last: Option<AllocationProgress>) -> RawResult {
        let acquired = last.map_or(0, |p| p.acquired);
        if let Some(signal) = status.signal() {
            if signal == Signal::SIGKILL as i32 {
                tracing::debug!(probe = %self.name, acquired, "allocation child killed");
                return self.exhaustion(acquired, Some(FaultKind::ResourceExhausted));
            }
            return RawResult::Signaled { signal };
        }
        match last {
            Some(p) if status.success() && p.finished => self.exhaustion(p.acquired, p.stopped_by),
            _ => ProbeFault::new(
                FaultKind::Other,
                format!("allocation child {status} without a final report"),
            )
            .with_code(status.code().unwrap_or(-1))
            .into(),
        }
    }
}

impl Probe for MemoryProbe {
    fn describe(&self) -> ProbeDescriptor {
        ProbeDescriptor::new(&self.name, Category::Memory)
    }

    fn run(&self, ctx: &ProbeContext) -> RawResult {
        self.held.open();
        self.children.open();
        tracing::debug!(
            probe = %self.name,
            target = self.target_bytes,
            isolated = self.is_isolated(),
            "acquiring memory"
        );
        match &self.isolation {
            Isolation::InProcess(allocator) => self.run_in_process(allocator.as_ref(), ctx),
            Isolation::Child { program, args } => self.run_in_child(program, args, ctx),
        }
    }

    fn cleanup(&self) {
        let blocks = self.held.release();
        let bytes: u64 = blocks.iter().map(|b| b.len() as u64).sum();
        drop(blocks);
        for mut child in self.children.release() {
            reap(&mut child);
        }
        tracing::debug!(probe = %self.name, bytes, "memory released");
    }
}

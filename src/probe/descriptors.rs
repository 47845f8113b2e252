// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! File-descriptor-ceiling probe.
//!
//! Opens handles in a tight loop until the soft `RLIMIT_NOFILE` plus a margin
//! is reached or an open fails. A declared ceiling replaces the live soft
//! limit: reaching `ceiling + margin` breaks the declaration even when the
//! process limit is higher. The report names which limit the target came from.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use nix::sys::resource::{getrlimit, Resource};
use parking_lot::Mutex;
use tempfile::TempDir;

use super::{Category, Held, Probe, ProbeContext, ProbeDescriptor};
use crate::outcome::{ProbeFault, ProbeValue, RawResult};

pub const DEFAULT_MARGIN: u64 = 10;

/// Used when the soft limit cannot be read.
const FALLBACK_SOFT_LIMIT: u64 = 1024;

/// Upper bound on the target when the soft limit is unlimited.
const MAX_TARGET: u64 = 1 << 20;

/// An open handle; dropping it closes the descriptor.
pub type OpenHandle = Box<dyn Send + Sync>;

/// Source of descriptors for the probe.
pub trait DescriptorSource: Send + Sync {
    /// Prepare a fresh invocation.
    fn prepare(&self) -> Result<(), ProbeFault> {
        Ok(())
    }

    /// Open the `index`-th handle.
    fn open(&self, index: u64) -> Result<OpenHandle, ProbeFault>;

    /// Remove whatever `prepare` and `open` left behind. Handles are closed first.
    fn reset(&self) {}
}

/// Write the marker line each scratch file carries.
fn stamp(file: &mut impl Write, index: u64) -> io::Result<()> {
    writeln!(file, "descriptor probe file {index}")
}

/// Writable files in a per-invocation scratch directory.
pub struct ScratchFiles {
    parent: Option<PathBuf>,
    dir: Mutex<Option<TempDir>>,
    write_failures: AtomicU64,
}

impl ScratchFiles {
    pub fn new(parent: Option<PathBuf>) -> Self {
        Self {
            parent,
            dir: Mutex::new(None),
            write_failures: AtomicU64::new(0),
        }
    }

    /// Files opened this invocation whose marker write failed. The descriptor
    /// still counts.
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    fn record_write(&self, index: u64, written: io::Result<()>) {
        if let Err(e) = written {
            self.write_failures.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(index, error = %e, "scratch file opened but write failed");
        }
    }
}

impl Default for ScratchFiles {
    fn default() -> Self {
        Self::new(None)
    }
}

impl DescriptorSource for ScratchFiles {
    fn prepare(&self) -> Result<(), ProbeFault> {
        let parent = self.parent.clone().unwrap_or_else(std::env::temp_dir);
        let dir = tempfile::Builder::new()
            .prefix("boundary-probe-fd")
            .tempdir_in(&parent)
            .map_err(|e| ProbeFault::from_io(&format!("create scratch dir in {}", parent.display()), &e))?;
        *self.dir.lock() = Some(dir);
        self.write_failures.store(0, Ordering::Relaxed);
        Ok(())
    }

    fn open(&self, index: u64) -> Result<OpenHandle, ProbeFault> {
        let path = match self.dir.lock().as_ref() {
            Some(dir) => dir.path().join(format!("probe_{index}.txt")),
            None => std::env::temp_dir().join(format!("boundary-probe-orphan-{index}.txt")),
        };
        // std errors keep the errno; EMFILE must survive to classification.
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| ProbeFault::from_io(&format!("open {}", path.display()), &e))?;
        self.record_write(index, stamp(&mut file, index));
        Ok(Box::new(file))
    }

    fn reset(&self) {
        let failures = self.write_failures();
        if failures > 0 {
            tracing::warn!(failures, "scratch files opened without their marker line");
        }
        if let Some(dir) = self.dir.lock().take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove scratch dir");
            }
        }
    }
}

/// Read the soft descriptor limit of the current process.
pub fn current_soft_limit() -> Option<u64> {
    getrlimit(Resource::RLIMIT_NOFILE).ok().map(|(soft, _)| soft as u64)
}

pub struct FdLimitProbe {
    name: String,
    soft_limit: Option<u64>,
    margin: u64,
    target: Option<u64>,
    source: Box<dyn DescriptorSource>,
    held: Held<OpenHandle>,
}

impl FdLimitProbe {
    /// Probe against the live soft limit, read at run time.
    pub fn new() -> Self {
        Self::with_source(Box::new(ScratchFiles::default()))
    }

    pub fn with_source(source: Box<dyn DescriptorSource>) -> Self {
        Self {
            name: "fd-ceiling".to_string(),
            soft_limit: None,
            margin: DEFAULT_MARGIN,
            target: None,
            source,
            held: Held::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Use a declared ceiling in place of the live soft limit.
    pub fn soft_limit(mut self, soft_limit: u64) -> Self {
        self.soft_limit = Some(soft_limit);
        self
    }

    pub fn margin(mut self, margin: u64) -> Self {
        self.margin = margin;
        self
    }

    /// Override the computed `soft limit + margin` target.
    pub fn target(mut self, target: u64) -> Self {
        self.target = Some(target);
        self
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    /// The target and, unless given explicitly, where it came from.
    fn resolve_target(&self) -> (u64, Option<String>) {
        if let Some(target) = self.target {
            return (target, None);
        }
        let (limit, mut basis) = match (self.soft_limit, current_soft_limit()) {
            (Some(ceiling), Some(live)) if live != ceiling => (
                ceiling,
                format!("declared ceiling {ceiling} + margin {}, live soft limit {live}", self.margin),
            ),
            (Some(ceiling), _) => (ceiling, format!("declared ceiling {ceiling} + margin {}", self.margin)),
            (None, Some(live)) => (live, format!("soft limit {live} + margin {}", self.margin)),
            (None, None) => {
                tracing::warn!(probe = %self.name, "soft descriptor limit unavailable, using fallback");
                (
                    FALLBACK_SOFT_LIMIT,
                    format!("fallback limit {FALLBACK_SOFT_LIMIT} + margin {}", self.margin),
                )
            }
        };
        let target = limit.saturating_add(self.margin);
        if target > MAX_TARGET {
            basis.push_str(&format!(", capped at {MAX_TARGET}"));
        }
        (target.min(MAX_TARGET), Some(basis))
    }
}

impl Default for FdLimitProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl Probe for FdLimitProbe {
    fn describe(&self) -> ProbeDescriptor {
        ProbeDescriptor::new(&self.name, Category::ResourceLimit)
    }

    fn run(&self, ctx: &ProbeContext) -> RawResult {
        self.held.open();
        if let Err(fault) = self.source.prepare() {
            return RawResult::Error(fault);
        }

        let (target, basis) = self.resolve_target();
        let mut opened: u64 = 0;
        tracing::debug!(probe = %self.name, target, "opening descriptors");

        while opened < target {
            if ctx.is_cancelled() {
                return ctx.timed_out();
            }
            match self.source.open(opened) {
                Ok(handle) => {
                    if self.held.hold(handle).is_err() {
                        return ctx.timed_out();
                    }
                    opened += 1;
                }
                Err(fault) => {
                    tracing::debug!(probe = %self.name, opened, error = %fault, "open refused");
                    return RawResult::Value(ProbeValue::Exhaustion {
                        unit: "descriptors".to_string(),
                        acquired: opened,
                        target,
                        stopped_by: Some(fault.kind),
                        basis,
                    });
                }
            }
        }

        RawResult::Value(ProbeValue::Exhaustion {
            unit: "descriptors".to_string(),
            acquired: opened,
            target,
            stopped_by: None,
            basis,
        })
    }

    fn cleanup(&self) {
        let handles = self.held.release();
        let closed = handles.len();
        drop(handles);
        self.source.reset();
        tracing::debug!(probe = %self.name, closed, "descriptors released");
    }
}

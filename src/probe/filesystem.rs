// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Filesystem probes.
//!
//! [`FsWriteProbe`] tries to create a uniquely named file in each protected
//! location. [`ScratchProbe`] is its control: write and read back a file in
//! each location the workload is meant to use.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::{Category, Held, Probe, ProbeContext, ProbeDescriptor};
use crate::outcome::{Attempt, FaultKind, ProbeFault, ProbeValue, RawResult};

pub const DEFAULT_TARGETS: [&str; 4] = ["/etc", "/usr", "/boot", "/"];

const CONTENT: &[u8] = b"boundary-probe write test\n";

fn scratch_path(dir: &Path) -> PathBuf {
    dir.join(format!(".boundary-probe-{}", Uuid::new_v4()))
}

pub struct FsWriteProbe {
    name: String,
    targets: Vec<PathBuf>,
    created: Held<PathBuf>,
}

impl FsWriteProbe {
    pub fn new(targets: Vec<PathBuf>) -> Self {
        Self {
            name: "fs-write".to_string(),
            targets,
            created: Held::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn targets(&self) -> &[PathBuf] {
        &self.targets
    }

    pub fn created_count(&self) -> usize {
        self.created.len()
    }

    fn attempt(&self, dir: &Path) -> Attempt {
        let label = dir.display().to_string();
        let path = scratch_path(dir);
        let context = format!("create {}", path.display());

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) => return Attempt::from_fault(label, &ProbeFault::from_io(&context, &e)),
        };
        if self.created.hold(path.clone()).is_err() {
            drop(file);
            remove(&path);
            return Attempt::from_fault(
                label,
                &ProbeFault::new(FaultKind::Interrupted, "released before write"),
            );
        }
        write_attempt(label, &path, file.write_all(CONTENT))
    }
}

/// Creation already crossed the boundary; a failed write only changes the detail.
fn write_attempt(label: String, path: &Path, written: io::Result<()>) -> Attempt {
    match written {
        Ok(()) => Attempt::succeeded(label, format!("created {}", path.display())),
        Err(e) => Attempt::succeeded(
            label,
            format!("created {} but write failed: {e}", path.display()),
        ),
    }
}

impl Default for FsWriteProbe {
    fn default() -> Self {
        Self::new(DEFAULT_TARGETS.iter().map(PathBuf::from).collect())
    }
}

fn remove(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove probe file");
    }
}

impl Probe for FsWriteProbe {
    fn describe(&self) -> ProbeDescriptor {
        ProbeDescriptor::new(&self.name, Category::Filesystem)
    }

    fn run(&self, ctx: &ProbeContext) -> RawResult {
        self.created.open();
        let mut attempts = Vec::with_capacity(self.targets.len());
        for dir in &self.targets {
            if ctx.is_cancelled() {
                return ctx.timed_out();
            }
            let attempt = self.attempt(dir);
            tracing::debug!(probe = %self.name, target = %attempt.target, status = ?attempt.status, "write attempt");
            attempts.push(attempt);
        }
        RawResult::Value(ProbeValue::Attempts { attempts })
    }

    fn cleanup(&self) {
        for path in self.created.release() {
            remove(&path);
        }
    }
}

/// Control for [`FsWriteProbe`]: the workload's own scratch space must be
/// writable, or blocked writes elsewhere say nothing.
pub struct ScratchProbe {
    name: String,
    targets: Vec<PathBuf>,
    created: Held<PathBuf>,
}

impl ScratchProbe {
    pub fn new(targets: Vec<PathBuf>) -> Self {
        Self {
            name: "fs-writable".to_string(),
            targets,
            created: Held::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn targets(&self) -> &[PathBuf] {
        &self.targets
    }

    pub fn created_count(&self) -> usize {
        self.created.len()
    }

    fn write_and_read(&self, dir: &Path) -> Result<Attempt, ProbeFault> {
        let path = scratch_path(dir);
        let context = format!("create {}", path.display());
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| ProbeFault::from_io(&context, &e))?;
        if self.created.hold(path.clone()).is_err() {
            drop(file);
            remove(&path);
            return Err(ProbeFault::new(FaultKind::Interrupted, "released before write"));
        }
        file.write_all(CONTENT)
            .and_then(|()| file.sync_all())
            .map_err(|e| ProbeFault::from_io(&format!("write {}", path.display()), &e))?;
        let read = fs::read(&path).map_err(|e| ProbeFault::from_io(&format!("read {}", path.display()), &e))?;
        if read != CONTENT {
            return Err(ProbeFault::new(
                FaultKind::Other,
                format!("read back {} bytes from {}, wrote {}", read.len(), path.display(), CONTENT.len()),
            ));
        }
        Ok(Attempt::succeeded(
            dir.display().to_string(),
            format!("wrote and read back {}", path.display()),
        ))
    }
}

impl Default for ScratchProbe {
    fn default() -> Self {
        Self::new(vec![std::env::temp_dir()])
    }
}

impl Probe for ScratchProbe {
    fn describe(&self) -> ProbeDescriptor {
        ProbeDescriptor::new(&self.name, Category::Filesystem).control()
    }

    /// Every target must work; the first failure is the result.
    fn run(&self, ctx: &ProbeContext) -> RawResult {
        self.created.open();
        let mut attempts = Vec::with_capacity(self.targets.len());
        for dir in &self.targets {
            if ctx.is_cancelled() {
                return ctx.timed_out();
            }
            match self.write_and_read(dir) {
                Ok(attempt) => attempts.push(attempt),
                Err(fault) => {
                    tracing::debug!(probe = %self.name, target = %dir.display(), error = %fault, "scratch write failed");
                    return fault.into();
                }
            }
        }
        RawResult::Value(ProbeValue::Attempts { attempts })
    }

    fn cleanup(&self) {
        for path in self.created.release() {
            remove(&path);
        }
    }
}

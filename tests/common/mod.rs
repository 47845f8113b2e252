//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use boundary_probe::outcome::{FaultKind, ProbeFault, ProbeValue, RawResult};
use boundary_probe::probe::descriptors::{DescriptorSource, OpenHandle};
use boundary_probe::probe::{Category, ChunkAllocator, Probe, ProbeContext, ProbeDescriptor};

/// What a [`Scripted`] probe does when run.
#[derive(Clone)]
pub enum Script {
    Return(RawResult),
    /// Sleep in short steps until cancelled or the duration passes.
    Sleep(Duration),
    /// Ignore cancellation and block for the full duration.
    BlockFor(Duration),
    Panic(&'static str),
}

pub struct Scripted {
    pub name: String,
    pub category: Category,
    pub side_effect_free: bool,
    pub expected: Option<boundary_probe::OutcomeKind>,
    pub script: Script,
    pub cleanup_delay: Duration,
    pub runs: AtomicUsize,
    pub cleanups: AtomicUsize,
}

impl Scripted {
    pub fn new(name: &str, category: Category, script: Script) -> Self {
        Self {
            name: name.to_string(),
            category,
            side_effect_free: false,
            expected: Some(boundary_probe::OutcomeKind::Blocked),
            script,
            cleanup_delay: Duration::ZERO,
            runs: AtomicUsize::new(0),
            cleanups: AtomicUsize::new(0),
        }
    }

    pub fn free(mut self) -> Self {
        self.side_effect_free = true;
        self
    }

    pub fn slow_cleanup(mut self, delay: Duration) -> Self {
        self.cleanup_delay = delay;
        self
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }
}

impl Probe for Scripted {
    fn describe(&self) -> ProbeDescriptor {
        let d = ProbeDescriptor::new(&self.name, self.category).expecting(self.expected);
        if self.side_effect_free {
            d.side_effect_free()
        } else {
            d
        }
    }

    fn run(&self, ctx: &ProbeContext) -> RawResult {
        self.runs.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Return(raw) => raw.clone(),
            Script::Sleep(total) => {
                let started = std::time::Instant::now();
                while started.elapsed() < *total {
                    if ctx.is_cancelled() {
                        return ctx.timed_out();
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
                RawResult::Value(ProbeValue::Exit { code: 0 })
            }
            Script::BlockFor(total) => {
                std::thread::sleep(*total);
                RawResult::Value(ProbeValue::Exit { code: 0 })
            }
            Script::Panic(message) => panic!("{message}"),
        }
    }

    fn cleanup(&self) {
        if !self.cleanup_delay.is_zero() {
            std::thread::sleep(self.cleanup_delay);
        }
        self.cleanups.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn denied(message: &str) -> RawResult {
    RawResult::Error(ProbeFault::new(FaultKind::PermissionDenied, message))
}

pub fn exited(code: i32) -> RawResult {
    RawResult::Value(ProbeValue::Exit { code })
}

/// Grants allocations until `limit` bytes are outstanding, then refuses.
pub struct CappedAllocator {
    limit: u64,
    granted: AtomicU64,
}

impl CappedAllocator {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            granted: AtomicU64::new(0),
        }
    }
}

impl ChunkAllocator for CappedAllocator {
    fn allocate(&self, len: usize) -> Result<Vec<u8>, ProbeFault> {
        let granted = self.granted.load(Ordering::SeqCst);
        if granted + len as u64 > self.limit {
            return Err(ProbeFault::new(FaultKind::ResourceExhausted, "cannot allocate memory").with_code(12));
        }
        self.granted.fetch_add(len as u64, Ordering::SeqCst);
        Ok(vec![0u8; len])
    }
}

/// Opens counted handles; the `fail_at`-th open (1-based) fails with EMFILE.
pub struct CountingSource {
    fail_at: Option<u64>,
    pub live: Arc<AtomicUsize>,
}

impl CountingSource {
    pub fn new(fail_at: Option<u64>) -> Self {
        Self {
            fail_at,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }
}

struct CountedHandle(Arc<AtomicUsize>);

impl Drop for CountedHandle {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl DescriptorSource for CountingSource {
    fn open(&self, index: u64) -> Result<OpenHandle, ProbeFault> {
        if self.fail_at == Some(index + 1) {
            return Err(ProbeFault::new(FaultKind::ResourceExhausted, "too many open files").with_code(24));
        }
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountedHandle(self.live.clone())))
    }
}

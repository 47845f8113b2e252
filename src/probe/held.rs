// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scoped holder for resources a probe acquires.

use parking_lot::Mutex;

struct HeldInner<T> {
    items: Vec<T>,
    sealed: bool,
}

/// Resources acquired by one probe invocation.
///
/// `open` at the start of `run`, `hold` each acquisition, `release` in
/// `cleanup`. Once released the holder is sealed: items offered afterwards by
/// an action that outlived its budget are dropped on the spot.
pub struct Held<T> {
    inner: Mutex<HeldInner<T>>,
}

impl<T> Held<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HeldInner {
                items: Vec::new(),
                sealed: true,
            }),
        }
    }

    /// Start a new invocation.
    pub fn open(&self) {
        self.inner.lock().sealed = false;
    }

    /// Record an acquisition. Returns the number of items now held, or the
    /// item back if the holder was already released.
    pub fn hold(&self, item: T) -> Result<usize, T> {
        let mut inner = self.inner.lock();
        if inner.sealed {
            return Err(item);
        }
        inner.items.push(item);
        Ok(inner.items.len())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the held items without releasing them.
    pub fn inspect<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.inner.lock().items)
    }

    pub fn inspect_mut<R>(&self, f: impl FnOnce(&mut [T]) -> R) -> R {
        f(&mut self.inner.lock().items)
    }

    /// Seal the holder and hand back everything it held.
    pub fn release(&self) -> Vec<T> {
        let mut inner = self.inner.lock();
        inner.sealed = true;
        std::mem::take(&mut inner.items)
    }
}

impl<T> Default for Held<T> {
    fn default() -> Self {
        Self::new()
    }
}

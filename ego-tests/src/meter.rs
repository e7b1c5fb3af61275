// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Measures how many jobs are inside [`ConcurrencyMeter::enter`] at once.
#[derive(Clone, Default)]
pub struct ConcurrencyMeter {
    inner: Arc<MeterCounters>,
}

#[derive(Default)]
struct MeterCounters {
    current: AtomicUsize,
    max: AtomicUsize,
    completed: AtomicUsize,
}

/// Leaves the meter when dropped, also when the job panics.
pub struct MeterGuard {
    inner: Arc<MeterCounters>,
}

impl ConcurrencyMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> MeterGuard {
        let now = self.inner.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max.fetch_max(now, Ordering::SeqCst);
        MeterGuard {
            inner: self.inner.clone(),
        }
    }

    pub fn current(&self) -> usize {
        self.inner.current.load(Ordering::SeqCst)
    }

    pub fn max(&self) -> usize {
        self.inner.max.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.inner.completed.load(Ordering::SeqCst)
    }
}

impl Drop for MeterGuard {
    fn drop(&mut self) {
        self.inner.current.fetch_sub(1, Ordering::SeqCst);
        self.inner.completed.fetch_add(1, Ordering::SeqCst);
    }
}

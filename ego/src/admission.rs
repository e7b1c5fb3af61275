// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// How many failed rounds `admit` spins before yielding its thread.
const SPINS_BEFORE_YIELD: u32 = 64;

/// Lock-free admission control: a running count bounded by a fixed capacity.
///
/// Nothing in here ever sleeps. Callers that do not get a slot from
/// [`Admission::try_admit`] are expected to queue the job instead.
#[derive(Debug)]
pub struct Admission {
    running: AtomicUsize,
    capacity: usize,
}

impl Admission {
    pub fn new(capacity: usize) -> Self {
        Self {
            running: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Reserves one slot. Returns `false` once the running count has reached
    /// the capacity; a lost race is retried, not reported.
    pub fn try_admit(&self) -> bool {
        let mut current = self.running.load(Ordering::SeqCst);
        loop {
            if current >= self.capacity {
                return false;
            }
            match self.running.compare_exchange_weak(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    /// Spins until a slot is reserved. Used by the dispatch loop, which must
    /// not pull the next queued job before the current one got a slot.
    pub fn admit(&self) {
        let mut spins = 0u32;
        while !self.try_admit() {
            spins += 1;
            if spins < SPINS_BEFORE_YIELD {
                std::hint::spin_loop();
            } else {
                spins = 0;
                thread::yield_now();
            }
        }
    }

    /// Gives back a slot taken by `try_admit` or `admit`.
    pub fn release(&self) {
        let previous = self.running.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "released more slots than were admitted");
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_saturated(&self) -> bool {
        self.running() >= self.capacity
    }
}

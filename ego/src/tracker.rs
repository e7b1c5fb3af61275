// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

/// Counts work that was accepted but has not finished yet.
///
/// The count itself is a plain atomic; the mutex/condvar pair only exists so
/// that [`InFlight::wait`] can sleep until the count drops to zero.
#[derive(Debug, Default)]
pub struct InFlight {
    count: AtomicUsize,
    lock: Mutex<()>,
    zero: Condvar,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Marks one unit of work as finished and wakes waiters on zero.
    pub fn done(&self) {
        let previous = self.count.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "in-flight counter went negative");
        if previous == 1 {
            // taking the lock orders this notify after a waiter's check
            let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
            self.zero.notify_all();
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Blocks until the count is zero.
    pub fn wait(&self) {
        let mut guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        while self.count.load(Ordering::SeqCst) != 0 {
            guard = self.zero.wait(guard).unwrap_or_else(|e| e.into_inner());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_wait_returns_immediately_when_idle() {
        let in_flight = InFlight::new();
        in_flight.wait();
        assert_eq!(in_flight.count(), 0);
    }

    #[test]
    fn test_wait_blocks_until_all_done() {
        let in_flight = Arc::new(InFlight::new());
        for _ in 0..3 {
            in_flight.add();
        }

        let finished = Arc::new(AtomicBool::new(false));
        let waiter = {
            let in_flight = in_flight.clone();
            let finished = finished.clone();
            thread::spawn(move || {
                in_flight.wait();
                finished.store(true, Ordering::SeqCst);
            })
        };

        in_flight.done();
        in_flight.done();
        thread::sleep(Duration::from_millis(30));
        assert!(!finished.load(Ordering::SeqCst));

        in_flight.done();
        waiter.join().unwrap();
        assert!(finished.load(Ordering::SeqCst));
    }
}

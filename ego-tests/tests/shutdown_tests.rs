// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use ego::{Context, DispatchError, Dispatcher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_close_waits_for_queued_jobs() {
    let dispatcher = Dispatcher::builder().capacity(1).build().unwrap();
    let done = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let done = done.clone();
        dispatcher
            .submit_plain(Context::background(), move |_ctx| {
                thread::sleep(Duration::from_millis(5));
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    let started = Instant::now();
    dispatcher.close();
    assert_eq!(done.load(Ordering::SeqCst), 5);
    // five sequential 5ms jobs; the first may already be running before
    // close() starts, so at least 4 x 5ms remain
    assert!(started.elapsed() >= Duration::from_millis(20));
}

#[test]
fn test_close_racing_submitters_never_loses_accepted_jobs() {
    let dispatcher = Arc::new(Dispatcher::builder().capacity(3).build().unwrap());
    let accepted = Arc::new(AtomicUsize::new(0));
    let ran = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(5));

    let submitters: Vec<_> = (0..4)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            let accepted = accepted.clone();
            let ran = ran.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                loop {
                    let ran = ran.clone();
                    let result = dispatcher.submit_plain(Context::background(), move |_ctx| {
                        thread::sleep(Duration::from_micros(100));
                        ran.fetch_add(1, Ordering::SeqCst);
                    });
                    match result {
                        Ok(()) => {
                            accepted.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(DispatchError::Closed) => break,
                        Err(err) => panic!("unexpected error: {err}"),
                    }
                }
            })
        })
        .collect();

    start.wait();
    thread::sleep(Duration::from_millis(20));
    dispatcher.close();
    let ran_at_close = ran.load(Ordering::SeqCst);

    for submitter in submitters {
        submitter.join().unwrap();
    }

    assert_eq!(ran_at_close, accepted.load(Ordering::SeqCst));
    assert_eq!(dispatcher.in_flight(), 0);
}

#[test]
fn test_close_from_several_threads() {
    let dispatcher = Arc::new(Dispatcher::builder().capacity(2).build().unwrap());
    let done = Arc::new(AtomicUsize::new(0));

    for _ in 0..4 {
        let done = done.clone();
        dispatcher
            .submit_plain(Context::background(), move |_ctx| {
                thread::sleep(Duration::from_millis(5));
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    let closers: Vec<_> = (0..3)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            let done = done.clone();
            thread::spawn(move || {
                dispatcher.close();
                assert_eq!(done.load(Ordering::SeqCst), 4);
            })
        })
        .collect();

    for closer in closers {
        closer.join().unwrap();
    }
}

#[test]
fn test_deadline_bounds_a_long_job() {
    let dispatcher = Dispatcher::builder().capacity(1).build().unwrap();
    let ctx = Context::with_timeout(Duration::from_millis(20));

    dispatcher
        .submit_plain(ctx, |ctx| {
            while !ctx.is_done() {
                thread::sleep(Duration::from_millis(1));
            }
        })
        .unwrap();

    let started = Instant::now();
    dispatcher.close();
    assert!(started.elapsed() < Duration::from_secs(2));
}

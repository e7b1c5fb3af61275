// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use anyhow::{bail, Context as _};
use clap::Parser;
use ego::{panic_message, Context, DispatcherConfig};
use log::{info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Floods a dispatcher with sleeping jobs and reports how it behaved.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Maximum number of concurrently running jobs
    #[arg(long, default_value_t = 2)]
    capacity: usize,

    /// Bound of the overflow queue (unbounded if omitted)
    #[arg(long)]
    queue_bound: Option<usize>,

    /// Dispatcher config (JSON encoded). Note that this excludes --capacity and --queue-bound.
    #[arg(long, value_name = "JSON", conflicts_with_all = ["capacity", "queue_bound"])]
    config: Option<String>,

    /// Number of jobs to submit
    #[arg(long, default_value_t = 5)]
    jobs: usize,

    /// How long every job sleeps
    #[arg(long, default_value_t = 10)]
    sleep_ms: u64,

    /// Let every n-th job panic
    #[arg(long)]
    panic_every: Option<usize>,

    /// Cancel every job's context after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
struct RunReport {
    capacity: usize,
    submitted: usize,
    completed: usize,
    recovered_panics: usize,
    max_running_sampled: usize,
    max_running_observed: usize,
    elapsed_ms: u128,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.panic_every == Some(0) {
        bail!("--panic-every must be at least 1");
    }

    let config = match &args.config {
        Some(json) => DispatcherConfig::from_json(json).context("failed to parse --config")?,
        None => DispatcherConfig {
            capacity: args.capacity,
            queue_bound: args.queue_bound,
        },
    };

    let recovered = Arc::new(AtomicUsize::new(0));
    let recovered_in_guard = recovered.clone();
    let dispatcher = Arc::new(
        config
            .into_builder()
            .recover(move |payload| {
                warn!("Job panicked: {}", panic_message(payload.as_ref()));
                recovered_in_guard.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .context("failed to start dispatcher")?,
    );
    info!("Submitting {} jobs to {:?}", args.jobs, dispatcher);

    let sampling = Arc::new(AtomicBool::new(true));
    let sampler = {
        let dispatcher = dispatcher.clone();
        let sampling = sampling.clone();
        thread::spawn(move || {
            let mut max = 0;
            while sampling.load(Ordering::SeqCst) {
                max = max.max(dispatcher.running());
                thread::sleep(Duration::from_millis(1));
            }
            max
        })
    };

    let current = Arc::new(AtomicUsize::new(0));
    let max_observed = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));
    let started = Instant::now();

    for i in 0..args.jobs {
        let ctx = match args.timeout_ms {
            Some(ms) => Context::with_timeout(Duration::from_millis(ms)),
            None => Context::background(),
        };
        let current = current.clone();
        let max_observed = max_observed.clone();
        let completed = completed.clone();
        let sleep = Duration::from_millis(args.sleep_ms);
        let panics = args.panic_every.is_some_and(|n| (i + 1) % n == 0);

        dispatcher.submit(
            ctx,
            move |ctx, job_args| {
                let id = job_args[0].downcast_ref::<usize>().copied().unwrap_or_default();
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                max_observed.fetch_max(now, Ordering::SeqCst);

                let until = Instant::now() + sleep;
                while Instant::now() < until && !ctx.is_done() {
                    thread::sleep(Duration::from_millis(1));
                }
                current.fetch_sub(1, Ordering::SeqCst);
                if panics {
                    panic!("job {id} failed on purpose");
                }
                completed.fetch_add(1, Ordering::SeqCst);
            },
            ego::args![i],
        )?;
    }

    dispatcher.close();
    let elapsed = started.elapsed();
    sampling.store(false, Ordering::SeqCst);
    let max_running_sampled = sampler.join().unwrap_or_default();

    let report = RunReport {
        capacity: dispatcher.capacity(),
        submitted: args.jobs,
        completed: completed.load(Ordering::SeqCst),
        recovered_panics: recovered.load(Ordering::SeqCst),
        max_running_sampled,
        max_running_observed: max_observed.load(Ordering::SeqCst),
        elapsed_ms: elapsed.as_millis(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.max_running_observed > report.capacity {
        bail!(
            "observed {} concurrent jobs with capacity {}",
            report.max_running_observed,
            report.capacity
        );
    }
    Ok(())
}

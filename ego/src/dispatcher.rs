// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use log::{debug, error, info};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::admission::Admission;
use crate::context::Context;
use crate::error::DispatchError;
use crate::job::{Args, Job};
use crate::queue::{ChannelQueue, JobQueue};
use crate::recover::{default_recover, PanicPayload, RecoverFn};
use crate::tracker::InFlight;

/// Capacity used when none (or zero) is configured.
pub const DEFAULT_CAPACITY: usize = 1000;

/// State shared by the dispatcher handle, the dispatch thread and every job
/// thread.
struct Shared {
    admission: Admission,
    in_flight: InFlight,
    queue: Box<dyn JobQueue>,
    recover: RecoverFn,
    closed: AtomicBool,
}

impl Shared {
    /// Accounting after a job ended, in this order: recovery guard (only on
    /// panic), in-flight counter, admission slot.
    fn finish(&self, panicked: Option<PanicPayload>) {
        if let Some(payload) = panicked {
            let recover = &self.recover;
            if panic::catch_unwind(AssertUnwindSafe(|| recover(payload))).is_err() {
                error!("Recovery guard panicked while handling a failed job");
            }
        }
        self.in_flight.done();
        self.admission.release();
    }
}

/// Runs at most `capacity` jobs at once and buffers the rest.
///
/// Jobs that find a free slot start right away on their own thread. All
/// others go to the [`JobQueue`], from which a single dispatch thread admits
/// them one at a time in arrival order.
pub struct Dispatcher {
    shared: Arc<Shared>,
    dispatch_thread: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("capacity", &self.capacity())
            .field("running", &self.running())
            .field("queued", &self.queued())
            .field("in_flight", &self.in_flight())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Dispatcher {
    /// A dispatcher with default capacity, an unbounded channel queue and the
    /// silent recovery guard.
    pub fn new() -> Result<Self, DispatchError> {
        Self::builder().build()
    }

    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// Submits a job. Returns as soon as the job either started or was
    /// accepted by the queue; with a bounded queue that may block.
    ///
    /// Fails with [`DispatchError::Closed`] once [`Dispatcher::close`] has
    /// been called. Nothing about the job's own outcome is reported.
    pub fn submit<F>(&self, ctx: Context, f: F, args: Args) -> Result<(), DispatchError>
    where
        F: FnOnce(Context, Args) + Send + 'static,
    {
        // counted before the closed check, so a concurrent close either
        // rejects this job or waits for it
        self.shared.in_flight.add();
        if self.shared.closed.load(Ordering::SeqCst) {
            self.shared.in_flight.done();
            return Err(DispatchError::Closed);
        }

        let job = Job::new(ctx, f, args);
        if self.shared.admission.try_admit() {
            run_job(&self.shared, job);
            return Ok(());
        }

        match self.shared.queue.enqueue(job) {
            Ok(()) => Ok(()),
            Err(_rejected) => {
                debug!("Queue closed while submitting, job dropped");
                self.shared.in_flight.done();
                Err(DispatchError::Closed)
            }
        }
    }

    /// Same as [`Dispatcher::submit`] for a callable without arguments.
    pub fn submit_plain<F>(&self, ctx: Context, f: F) -> Result<(), DispatchError>
    where
        F: FnOnce(Context) + Send + 'static,
    {
        self.submit(ctx, move |ctx, _args| f(ctx), Args::new())
    }

    /// Stops accepting jobs and blocks until every accepted job, queued ones
    /// included, has finished. Running jobs are not interrupted.
    ///
    /// Calling it again is harmless. Calling it from inside a job deadlocks.
    pub fn close(&self) {
        if !self.shared.closed.swap(true, Ordering::SeqCst) {
            debug!(
                "Closing dispatcher with {} jobs in flight, {} queued",
                self.in_flight(),
                self.queued()
            );
            self.shared.queue.close();
        }
        self.shared.in_flight.wait();

        let handle = self
            .dispatch_thread
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Dispatch thread panicked");
            }
            info!("Dispatcher shut down");
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.admission.capacity()
    }

    /// Jobs currently holding a slot.
    pub fn running(&self) -> usize {
        self.shared.admission.running()
    }

    /// Jobs still owned by the queue. With the default [`ChannelQueue`] this
    /// includes submitters currently blocked on a full bounded queue.
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    /// Accepted jobs that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.count()
    }

    pub fn is_saturated(&self) -> bool {
        self.shared.admission.is_saturated()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // let the dispatch thread drain and exit without waiting for it
        if !self.shared.closed.swap(true, Ordering::SeqCst) {
            self.shared.queue.close();
        }
    }
}

/// Starts an admitted job on its own thread.
fn run_job(shared: &Arc<Shared>, job: Job) {
    let worker = shared.clone();
    let spawned = thread::Builder::new()
        .name("ego-job".into())
        .spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| job.run()));
            worker.finish(outcome.err());
        });

    if let Err(err) = spawned {
        error!("Failed to spawn job thread, job dropped: {err}");
        shared.finish(None);
    }
}

/// Moves queued jobs into free slots until the queue is closed and drained.
async fn dispatch_loop(shared: Arc<Shared>) {
    info!(
        "Dispatch loop started with capacity {}",
        shared.admission.capacity()
    );
    while let Some((job, ack)) = shared.queue.dequeue().await {
        shared.admission.admit();
        run_job(&shared, job);
        if let Some(ack) = ack {
            ack();
        }
    }
    info!("Dispatch loop ended, queue closed and drained");
}

/// Collects the dispatcher's collaborators before starting it.
pub struct DispatcherBuilder {
    capacity: usize,
    queue: Option<Box<dyn JobQueue>>,
    recover: Option<RecoverFn>,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            queue: None,
            recover: None,
        }
    }
}

impl DispatcherBuilder {
    /// Maximum number of jobs running at once. Zero selects
    /// [`DEFAULT_CAPACITY`].
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Replaces the default unbounded [`ChannelQueue`].
    pub fn queue(mut self, queue: impl JobQueue) -> Self {
        self.queue = Some(Box::new(queue));
        self
    }

    /// Replaces the default recovery guard, which swallows panics.
    ///
    /// The guard only sees the payload after unwinding. The process-wide
    /// panic hook has already run by then, and the default hook prints every
    /// job panic to stderr; install a quiet hook with
    /// [`std::panic::set_hook`] to silence that.
    pub fn recover<F>(mut self, recover: F) -> Self
    where
        F: Fn(PanicPayload) + Send + Sync + 'static,
    {
        self.recover = Some(Arc::new(recover));
        self
    }

    /// Starts the dispatch thread.
    pub fn build(self) -> Result<Dispatcher, DispatchError> {
        let capacity = if self.capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            self.capacity
        };

        let shared = Arc::new(Shared {
            admission: Admission::new(capacity),
            in_flight: InFlight::new(),
            queue: self
                .queue
                .unwrap_or_else(|| Box::new(ChannelQueue::unbounded())),
            recover: self.recover.unwrap_or_else(|| Arc::new(default_recover)),
            closed: AtomicBool::new(false),
        });

        let shared_for_thread = shared.clone();
        let dispatch_thread = thread::Builder::new()
            .name("ego-dispatch".into())
            .spawn(move || futures::executor::block_on(dispatch_loop(shared_for_thread)))
            .map_err(DispatchError::Spawn)?;

        Ok(Dispatcher {
            shared,
            dispatch_thread: Mutex::new(Some(dispatch_thread)),
        })
    }
}

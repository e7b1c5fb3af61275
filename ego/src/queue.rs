// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

//! Overflow queue for jobs that could not be admitted right away.
//!
//! The dispatcher only talks to the [`JobQueue`] trait. [`ChannelQueue`] is the
//! default and is backed by an `async_channel`.

use async_channel::{Receiver, Sender};
use async_trait::async_trait;
use log::debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::job::Job;

/// Acknowledges that a dequeued job has been handed to execution.
pub type Ack = Box<dyn FnOnce() + Send + 'static>;

#[async_trait]
pub trait JobQueue: Send + Sync + 'static {
    /// Buffers a job. May block if the queue is bounded and full.
    /// Hands the job back if the queue has been closed.
    fn enqueue(&self, job: Job) -> Result<(), Job>;

    /// Waits for the next job. `None` means closed and drained; it is final.
    ///
    /// The optional [`Ack`] is invoked by the consumer once the job runs.
    async fn dequeue(&self) -> Option<(Job, Option<Ack>)>;

    /// Number of jobs still owned by the queue (enqueued, not yet acked).
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops accepting jobs. Must be idempotent.
    fn close(&self);
}

#[async_trait]
impl<Q: JobQueue + ?Sized> JobQueue for Arc<Q> {
    fn enqueue(&self, job: Job) -> Result<(), Job> {
        (**self).enqueue(job)
    }

    async fn dequeue(&self) -> Option<(Job, Option<Ack>)> {
        (**self).dequeue().await
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn close(&self) {
        (**self).close()
    }
}

/// FIFO queue on top of an `async_channel`.
///
/// Closing the channel keeps the buffered jobs: they are still handed out by
/// [`JobQueue::dequeue`] before it reports `None`.
///
/// [`JobQueue::len`] counts a job from the moment `enqueue` is called until
/// its ack runs. On a bounded queue that includes jobs whose submitter is
/// still blocked waiting for space, and the one job the consumer holds.
#[derive(Debug)]
pub struct ChannelQueue {
    tx: Sender<Job>,
    rx: Receiver<Job>,
    len: Arc<AtomicUsize>,
}

impl ChannelQueue {
    pub fn unbounded() -> Self {
        Self::from_channel(async_channel::unbounded())
    }

    /// A queue holding at most `cap` jobs; `enqueue` blocks while it is full.
    ///
    /// # Panics
    /// Panics if `cap` is zero.
    pub fn bounded(cap: usize) -> Self {
        Self::from_channel(async_channel::bounded(cap))
    }

    fn from_channel((tx, rx): (Sender<Job>, Receiver<Job>)) -> Self {
        Self {
            tx,
            rx,
            len: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.tx.capacity()
    }
}

impl Default for ChannelQueue {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[async_trait]
impl JobQueue for ChannelQueue {
    fn enqueue(&self, job: Job) -> Result<(), Job> {
        // counted before the send so that an ack can never run ahead of it
        self.len.fetch_add(1, Ordering::SeqCst);
        match self.tx.send_blocking(job) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.len.fetch_sub(1, Ordering::SeqCst);
                Err(err.into_inner())
            }
        }
    }

    async fn dequeue(&self) -> Option<(Job, Option<Ack>)> {
        let job = self.rx.recv().await.ok()?;
        let len = self.len.clone();
        let ack: Ack = Box::new(move || {
            len.fetch_sub(1, Ordering::SeqCst);
        });
        Some((job, Some(ack)))
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    fn close(&self) {
        if self.tx.close() {
            debug!("Job queue closed with {} buffered jobs", self.rx.len());
        }
    }
}

// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use async_trait::async_trait;
use ego::{Ack, ChannelQueue, Job, JobQueue};
use log::debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A [`JobQueue`] double that forwards to a [`ChannelQueue`] and counts what
/// passes through it.
#[derive(Default)]
pub struct RecordingQueue {
    inner: ChannelQueue,
    stats: Arc<QueueStats>,
}

#[derive(Debug, Default)]
pub struct QueueStats {
    pub enqueued: AtomicUsize,
    pub dequeued: AtomicUsize,
    pub acked: AtomicUsize,
    pub closed: AtomicUsize,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        self.stats.clone()
    }
}

impl QueueStats {
    pub fn enqueued(&self) -> usize {
        self.enqueued.load(Ordering::SeqCst)
    }

    pub fn dequeued(&self) -> usize {
        self.dequeued.load(Ordering::SeqCst)
    }

    pub fn acked(&self) -> usize {
        self.acked.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobQueue for RecordingQueue {
    fn enqueue(&self, job: Job) -> Result<(), Job> {
        self.inner.enqueue(job)?;
        self.stats.enqueued.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn dequeue(&self) -> Option<(Job, Option<Ack>)> {
        let (job, inner_ack) = self.inner.dequeue().await?;
        self.stats.dequeued.fetch_add(1, Ordering::SeqCst);
        let stats = self.stats.clone();
        let ack: Ack = Box::new(move || {
            if let Some(inner_ack) = inner_ack {
                inner_ack();
            }
            stats.acked.fetch_add(1, Ordering::SeqCst);
        });
        Some((job, Some(ack)))
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn close(&self) {
        debug!("Recording queue closed");
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        self.inner.close();
    }
}

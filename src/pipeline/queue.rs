//! Bounded FIFO between the feeder and the workers.
//!
//! Backed by a `crossbeam_channel::bounded` channel: `push` blocks while `capacity` jobs are
//! queued, `pop` blocks while empty. Stop signals take a slot like any item. Closing the queue
//! (dropping the only sender) lets workers drain what is left and then see termination.

use crossbeam_channel::{Receiver, Select, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::WorkItem;
use crate::pipeline::cancel::CancelToken;

/// What travels through the queue.
#[derive(Debug)]
pub enum Job {
    Item(WorkItem),
    /// One per worker; a worker that pops it exits without forwarding it.
    Stop,
}

/// Result of [`WorkQueue::push_or_cancel`].
#[derive(Debug)]
pub enum Pushed {
    Queued,
    /// Cancellation fired first; the job is handed back unqueued.
    Cancelled(Job),
    /// The queue was closed; the job is handed back unqueued.
    Closed(Job),
}

/// Counters shared by the queue and its consumers.
#[derive(Debug, Default)]
pub struct QueueStats {
    pushed: AtomicU64,
    popped: AtomicU64,
    high_water: AtomicUsize,
}

impl QueueStats {
    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    pub fn popped(&self) -> u64 {
        self.popped.load(Ordering::Relaxed)
    }

    /// Largest queue length observed right after a push.
    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::Relaxed)
    }
}

/// Producer side. Owns the only sender.
pub struct WorkQueue {
    tx: Option<Sender<Job>>,
    rx: Receiver<Job>,
    capacity: usize,
    stats: Arc<QueueStats>,
}

/// Consumer side, one clone per worker.
#[derive(Clone)]
pub struct QueueConsumer {
    rx: Receiver<Job>,
    stats: Arc<QueueStats>,
}

impl WorkQueue {
    /// `capacity` must be at least 1 (a zero-capacity crossbeam channel is a rendezvous, not a queue).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);
        Self {
            tx: Some(tx),
            rx,
            capacity,
            stats: Arc::new(QueueStats::default()),
        }
    }

    pub fn consumer(&self) -> QueueConsumer {
        QueueConsumer {
            rx: self.rx.clone(),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Block until there is room, then enqueue. Returns the job back if the queue is closed.
    pub fn push(&self, job: Job) -> Result<(), Job> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(job);
        };
        tx.send(job).map_err(|e| e.into_inner())?;
        self.note_push(tx);
        Ok(())
    }

    /// Like [`Self::push`], but gives up as soon as `cancel` fires.
    pub fn push_or_cancel(&self, job: Job, cancel: &CancelToken) -> Pushed {
        let Some(tx) = self.tx.as_ref() else {
            return Pushed::Closed(job);
        };
        if cancel.is_cancelled() {
            return Pushed::Cancelled(job);
        }
        let mut sel = Select::new();
        let send_idx = sel.send(tx);
        let cancel_idx = sel.recv(cancel.signal());
        let oper = sel.select();
        match oper.index() {
            i if i == send_idx => match oper.send(tx, job) {
                Ok(()) => {
                    self.note_push(tx);
                    Pushed::Queued
                }
                Err(e) => Pushed::Closed(e.into_inner()),
            },
            i => {
                debug_assert_eq!(i, cancel_idx);
                let _ = oper.recv(cancel.signal());
                Pushed::Cancelled(job)
            }
        }
    }

    /// Remove every item still queued without blocking. Stop signals are dropped.
    pub fn drain_pending(&self) -> Vec<WorkItem> {
        self.rx
            .try_iter()
            .filter_map(|job| match job {
                Job::Item(item) => {
                    self.stats.popped.fetch_add(1, Ordering::Relaxed);
                    Some(item)
                }
                Job::Stop => None,
            })
            .collect()
    }

    /// Drop the sender. Consumers drain the remainder, then `pop` returns `None`.
    pub fn close(&mut self) {
        self.tx.take();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_none()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }

    fn note_push(&self, tx: &Sender<Job>) {
        self.stats.pushed.fetch_add(1, Ordering::Relaxed);
        self.stats.high_water.fetch_max(tx.len(), Ordering::Relaxed);
    }
}

impl QueueConsumer {
    /// Block until a job is available. `None` once the queue is closed and empty.
    pub fn pop(&self) -> Option<Job> {
        let job = self.rx.recv().ok()?;
        self.stats.popped.fetch_add(1, Ordering::Relaxed);
        Some(job)
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

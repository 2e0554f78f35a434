//! Coordinator: owns the queue and pool for one run.
//!
//! `Idle -> Submitting -> Draining -> (Joined | TimedOut) -> Reported`. Submission feeds every
//! source row through the bounded queue, then one stop signal per worker. Draining waits on the
//! workers' exit notices up to the join timeout; stragglers are reported, never killed. Their
//! handles stay with the coordinator so callers can let in-flight writes finish before exiting.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::engine::progress::{ProgressBar, create_counter, create_progress_bar};
use crate::error::{DispatchError, ItemError, RowError};
use crate::pipeline::aggregator::Aggregator;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::context::{PoolHandles, WorkerContext};
use crate::pipeline::executor::ExecutorFactory;
use crate::pipeline::queue::{Job, Pushed, WorkQueue};
use crate::pipeline::throttle::Throttle;
use crate::pipeline::worker::spawn_workers;
use crate::{CategoryRules, Outcome, PoolConfig, RunState, RunSummary, Substrate, WorkItem};

/// One row from a source: an item, or the reason that row could not be read.
pub type SourceRow = Result<WorkItem, RowError>;

/// Progress display for a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Progress {
    #[default]
    Off,
    /// Counter with no total (streaming source).
    Counter,
    /// Percentage bar over a known item count.
    Total(usize),
}

/// Runs one dispatch. Build it, configure it, call [`Coordinator::run`] once.
pub struct Coordinator {
    output_root: PathBuf,
    config: PoolConfig,
    rules: CategoryRules,
    factory: Arc<dyn ExecutorFactory>,
    cancel: CancelToken,
    progress: Progress,
    state: RunState,
    stragglers: Stragglers,
}

/// Workers still running when the join timeout expired.
///
/// Dropping this detaches them; a process that exits right after would cut their writes short.
#[derive(Debug, Default)]
pub struct Stragglers {
    handles: BTreeMap<usize, JoinHandle<()>>,
}

impl Stragglers {
    /// Worker ids, ascending.
    pub fn ids(&self) -> Vec<usize> {
        self.handles.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Block until every straggler has left its loop. Returns how many were joined.
    pub fn join(self) -> usize {
        let count = self.handles.len();
        for (id, handle) in self.handles {
            if handle.join().is_err() {
                warn!("worker {} panicked outside an item", id);
            } else {
                debug!("straggler worker {} finished", id);
            }
        }
        count
    }
}

/// What submission produced.
struct Submitted {
    count: usize,
    discarded: usize,
}

impl Coordinator {
    pub fn new(output_root: &Path, config: PoolConfig) -> Self {
        Self {
            output_root: output_root.to_path_buf(),
            config,
            rules: CategoryRules::default(),
            factory: Arc::new(Substrate::Threads),
            cancel: CancelToken::new(),
            progress: Progress::Off,
            state: RunState::Idle,
            stragglers: Stragglers::default(),
        }
    }

    pub fn with_rules(mut self, rules: CategoryRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_substrate(mut self, substrate: Substrate) -> Self {
        self.factory = Arc::new(substrate);
        self
    }

    /// Use a custom executor per worker (e.g. instrumented or remote writers).
    pub fn with_factory(mut self, factory: Arc<dyn ExecutorFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Handles of the workers that missed the join timeout of the last run (empty after a clean
    /// join). Takes them out of the coordinator.
    pub fn take_stragglers(&mut self) -> Stragglers {
        std::mem::take(&mut self.stragglers)
    }

    fn transition(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_move_to(next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!("coordinator: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Dispatch every row of `rows` and return the final summary.
    ///
    /// Fails only if the config is invalid, the coordinator was already used, or the pool
    /// cannot be built. Per-item problems end up in the summary.
    pub fn run<I>(&mut self, rows: I) -> Result<RunSummary, DispatchError>
    where
        I: IntoIterator<Item = SourceRow>,
    {
        if self.state != RunState::Idle {
            return Err(DispatchError::Config(format!(
                "coordinator already used (state {:?})",
                self.state
            )));
        }
        self.config.validate()?;
        let start = Instant::now();

        let mut queue = WorkQueue::new(self.config.queue_capacity);
        let aggregator = Arc::new(Aggregator::new());
        let progress = self.progress_bar();
        let ctx = Arc::new(WorkerContext {
            output_root: self.output_root.clone(),
            rules: self.rules.clone(),
            aggregator: Arc::clone(&aggregator),
            throttle: self.config.max_concurrent_active.map(Throttle::new),
            progress,
        });
        // On error `queue` drops here, which closes it and lets started workers exit.
        let PoolHandles { workers, exit_rx } = spawn_workers(
            self.config.worker_count,
            &queue.consumer(),
            &ctx,
            self.factory.as_ref(),
        )?;
        drop(ctx);
        debug!(
            "pool up: {} workers, queue capacity {}, throttle {:?}",
            workers.len(),
            queue.capacity(),
            self.config.max_concurrent_active
        );

        self.transition(RunState::Submitting);
        let submitted = self.submit(&mut queue, &aggregator, rows);

        self.transition(RunState::Draining);
        let workers = workers.into_iter().map(|w| (w.id, w.handle)).collect();
        self.stragglers = wait_for_workers(workers, &exit_rx, self.config.join_timeout);
        let timed_out_workers = self.stragglers.ids();
        if timed_out_workers.is_empty() {
            self.transition(RunState::Joined);
        } else {
            warn!(
                "{} worker(s) still running after {:?}: {:?}",
                timed_out_workers.len(),
                self.config.join_timeout,
                timed_out_workers
            );
            self.transition(RunState::TimedOut);
        }
        let drained_via = self.state;

        let tally = aggregator.snapshot();
        debug!("{} outcomes recorded for {} submitted", tally.recorded(), submitted.count);
        self.transition(RunState::Reported);
        let summary = RunSummary {
            submitted: submitted.count,
            succeeded: tally.succeeded,
            failed: tally.failed,
            discarded: submitted.discarded,
            elapsed: start.elapsed(),
            drained_via,
            timed_out_workers,
            outcomes: tally.outcomes,
        };
        if summary.timed_out() && summary.unaccounted() > 0 {
            warn!(
                "{} of {} items have no outcome (workers timed out)",
                summary.unaccounted(),
                summary.submitted
            );
        }
        info!(
            "submitted {}, succeeded {}, failed {}",
            summary.submitted, summary.succeeded, summary.failed
        );
        Ok(summary)
    }

    /// Feed rows into the queue, then terminate the workers.
    ///
    /// Normal end: one stop signal per worker. Cancelled (while feeding items or stop signals):
    /// pending items are pulled back out, recorded as discarded failures, and the queue is closed
    /// instead. Every push waits on the cancel token, so a full queue held by stuck workers never
    /// pins the feeder.
    fn submit<I>(&self, queue: &mut WorkQueue, aggregator: &Aggregator, rows: I) -> Submitted
    where
        I: IntoIterator<Item = SourceRow>,
    {
        let mut count = 0_usize;
        let mut discarded_count = 0_usize;
        let mut cancelled = false;
        for row in rows {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            count += 1;
            let item = match row {
                Ok(item) => item,
                Err(RowError { id, reason }) => {
                    warn!("item {} unreadable: {}", id, reason);
                    aggregator.record(Outcome::failure(id, ItemError::Row(reason).to_string()));
                    continue;
                }
            };
            match queue.push_or_cancel(Job::Item(item), &self.cancel) {
                Pushed::Queued => {}
                Pushed::Cancelled(job) | Pushed::Closed(job) => {
                    if let Job::Item(item) = job {
                        aggregator.record(discarded(item.id));
                        discarded_count += 1;
                    }
                    cancelled = true;
                    break;
                }
            }
        }

        if !cancelled {
            let workers = self.config.worker_count;
            debug!("submitted {} items, sending {} stop signals", count, workers);
            for sent in 0..workers {
                match queue.push_or_cancel(Job::Stop, &self.cancel) {
                    Pushed::Queued => {}
                    Pushed::Cancelled(_) => {
                        debug!("cancelled after {} of {} stop signals", sent, workers);
                        cancelled = true;
                        break;
                    }
                    Pushed::Closed(_) => break,
                }
            }
        }

        if cancelled {
            let pending = queue.drain_pending();
            discarded_count += pending.len();
            for item in pending {
                aggregator.record(discarded(item.id));
            }
            queue.close();
            warn!(
                "run cancelled after {} items; {} discarded before processing",
                count, discarded_count
            );
        }
        Submitted {
            count,
            discarded: discarded_count,
        }
    }

    fn progress_bar(&self) -> Option<ProgressBar> {
        match self.progress {
            Progress::Off => None,
            Progress::Counter => Some(create_counter()),
            Progress::Total(total) => Some(create_progress_bar(total)),
        }
    }
}

fn discarded(id: u64) -> Outcome {
    Outcome::failure(id, ItemError::Discarded.to_string())
}

/// Join workers as their exit notices arrive, until all are in or `timeout` passes.
/// Returns the workers still running. They are not stopped.
pub fn wait_for_workers(
    workers: BTreeMap<usize, JoinHandle<()>>,
    exit_rx: &Receiver<usize>,
    timeout: Duration,
) -> Stragglers {
    let mut pending = workers;
    let deadline = Instant::now().checked_add(timeout);
    while !pending.is_empty() {
        let next = match exit_rx.try_recv() {
            Ok(id) => Ok(id),
            Err(_) => match deadline {
                Some(deadline) => exit_rx.recv_deadline(deadline),
                None => exit_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            },
        };
        match next {
            Ok(id) => {
                if let Some(handle) = pending.remove(&id)
                    && handle.join().is_err()
                {
                    warn!("worker {} panicked outside an item", id);
                }
            }
            Err(RecvTimeoutError::Timeout) => break,
            Err(RecvTimeoutError::Disconnected) => {
                // Every notice sender is gone, so every worker has left its loop.
                for (id, handle) in std::mem::take(&mut pending) {
                    if handle.join().is_err() {
                        warn!("worker {} panicked outside an item", id);
                    }
                }
            }
        }
    }
    Stragglers { handles: pending }
}

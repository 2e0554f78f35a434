//! Worker loop: pop, resolve destination, execute, record. Per-item failures never end the loop.

use crossbeam_channel::{Sender, unbounded};
use log::{debug, warn};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crate::engine::progress::update_progress_bar;
use crate::engine::tools::resolve_destination;
use crate::error::{DispatchError, ItemError};
use crate::pipeline::context::{PoolHandles, WorkerContext, WorkerHandle};
use crate::pipeline::executor::{Executor, ExecutorFactory};
use crate::pipeline::queue::{Job, QueueConsumer};
use crate::utils::config::PackagePaths;
use crate::{Outcome, WorkItem, WriteRequest};

/// Sends the worker id on drop, so the coordinator hears about every exit (panics included).
struct ExitNotice {
    id: usize,
    tx: Sender<usize>,
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        let _ = self.tx.send(self.id);
    }
}

/// Resolve, execute under the throttle, and turn the result into an [`Outcome`].
/// Panics from the executor are caught here.
pub fn process_item(item: WorkItem, ctx: &WorkerContext, executor: &mut dyn Executor) -> Outcome {
    let id = item.id;
    let destination = resolve_destination(&ctx.output_root, &item, &ctx.rules);
    let req = WriteRequest { item, destination };

    let result = {
        let _permit = ctx.throttle.as_ref().map(|t| t.acquire());
        panic::catch_unwind(AssertUnwindSafe(|| executor.execute(&req)))
            .unwrap_or_else(|payload| Err(ItemError::Panic(panic_message(payload.as_ref()))))
    };

    match result {
        Ok(path) => {
            debug!("item {} -> {}", id, path.display());
            Outcome::success(id)
        }
        Err(e) => {
            warn!("item {} failed: {}", id, e);
            Outcome::failure(id, e.to_string())
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// Single worker: loop until a stop signal or a closed, empty queue.
fn worker_loop(
    id: usize,
    consumer: QueueConsumer,
    ctx: Arc<WorkerContext>,
    mut executor: Box<dyn Executor>,
    _exit: ExitNotice,
) {
    let mut handled = 0_usize;
    loop {
        match consumer.pop() {
            Some(Job::Item(item)) => {
                let outcome = process_item(item, &ctx, executor.as_mut());
                ctx.aggregator.record(outcome);
                if let Some(pb) = ctx.progress.as_ref() {
                    update_progress_bar(pb, 1);
                }
                handled += 1;
            }
            Some(Job::Stop) => break,
            None => {
                debug!("worker {}: queue closed", id);
                break;
            }
        }
    }
    debug!("worker {} exiting after {} items", id, handled);
    // Executor (and any child process) is released before the exit notice fires.
    drop(executor);
}

/// Build one executor per worker and spawn the worker threads.
///
/// On error, workers already started exit once the caller closes (drops) the queue.
pub fn spawn_workers(
    count: usize,
    consumer: &QueueConsumer,
    ctx: &Arc<WorkerContext>,
    factory: &dyn ExecutorFactory,
) -> Result<PoolHandles, DispatchError> {
    let (exit_tx, exit_rx) = unbounded::<usize>();
    let mut workers = Vec::with_capacity(count);
    for id in 0..count {
        let executor = factory
            .build(id)
            .map_err(|source| DispatchError::Spawn { worker: id, source })?;
        let consumer = consumer.clone();
        let ctx = Arc::clone(ctx);
        let exit = ExitNotice {
            id,
            tx: exit_tx.clone(),
        };
        let handle = thread::Builder::new()
            .name(PackagePaths::get().worker_thread_name(id))
            .spawn(move || worker_loop(id, consumer, ctx, executor, exit))
            .map_err(|source| DispatchError::Spawn { worker: id, source })?;
        workers.push(WorkerHandle { id, handle });
    }
    Ok(PoolHandles { workers, exit_rx })
}

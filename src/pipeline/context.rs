//! Shared state handed to every worker, and the handles the coordinator keeps.

use crossbeam_channel::Receiver;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::CategoryRules;
use crate::engine::progress::ProgressBar;
use crate::pipeline::aggregator::Aggregator;
use crate::pipeline::throttle::Throttle;

/// Read-only destination context plus the shared outcome sink.
pub struct WorkerContext {
    pub output_root: PathBuf,
    pub rules: CategoryRules,
    pub aggregator: Arc<Aggregator>,
    /// Present when `max_concurrent_active` is set.
    pub throttle: Option<Throttle>,
    pub progress: Option<ProgressBar>,
}

/// One spawned worker.
pub struct WorkerHandle {
    pub id: usize,
    pub handle: JoinHandle<()>,
}

/// Everything the coordinator needs after the pool is up: worker handles and the exit channel
/// each worker reports its id on when its loop ends.
pub struct PoolHandles {
    pub workers: Vec<WorkerHandle>,
    pub exit_rx: Receiver<usize>,
}

//! Dispatch engine: bounded queue, worker pool, coordinator.

pub mod aggregator;
pub mod cancel;
pub mod context;
pub mod executor;
pub mod orchestrator;
pub mod queue;
pub mod throttle;
pub mod worker;
pub mod writer;

pub use aggregator::{Aggregator, Tally};
pub use cancel::CancelToken;
pub use context::{PoolHandles, WorkerContext, WorkerHandle};
pub use executor::{
    ChildProcessExecutor, Executor, ExecutorFactory, InProcessExecutor, WORKER_STDIO_FLAG,
    WriteReply, serve_stdio,
};
pub use orchestrator::{Coordinator, Progress, SourceRow, Stragglers, wait_for_workers};
pub use queue::{Job, Pushed, QueueConsumer, QueueStats, WorkQueue};
pub use throttle::{Permit, Throttle};
pub use worker::{process_item, spawn_workers};
pub use writer::{ensure_dir, render, write_artifact, write_atomic};

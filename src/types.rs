//! Public and internal types for the cvfanout API and pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::DispatchError;
use crate::utils::config::{NamingConsts, PoolDefaults};

/// One record pulled from the source. `id` is the 0-based data-row position; `fields` keep
/// source column order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: u64,
    pub fields: Vec<(String, String)>,
}

impl WorkItem {
    pub fn new(id: u64, fields: Vec<(String, String)>) -> Self {
        Self { id, fields }
    }

    /// Value of the first field named `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Where one item's artifact lands: `root/category/item_<id>.txt`.
///
/// `category` is already sanitized (single safe path segment).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub root: PathBuf,
    pub category: String,
}

impl Destination {
    /// Directory holding every artifact of this category.
    pub fn dir(&self) -> PathBuf {
        self.root.join(&self.category)
    }

    /// Final artifact path for `id`. Unique per id inside [`Self::dir`].
    pub fn file_path(&self, id: u64) -> PathBuf {
        self.dir().join(artifact_file_name(id))
    }
}

/// `item_<id>.txt`
pub fn artifact_file_name(id: u64) -> String {
    format!(
        "{}{}.{}",
        NamingConsts::ARTIFACT_PREFIX,
        id,
        NamingConsts::ARTIFACT_EXT
    )
}

/// One write handed to an executor: the item plus its resolved destination.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WriteRequest {
    pub item: WorkItem,
    pub destination: Destination,
}

/// Per-item result status. Failures carry the rendered error text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutcomeStatus {
    Success,
    Failure(String),
}

/// Produced exactly once per submitted item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub item_id: u64,
    pub status: OutcomeStatus,
}

impl Outcome {
    pub fn success(item_id: u64) -> Self {
        Self {
            item_id,
            status: OutcomeStatus::Success,
        }
    }

    pub fn failure(item_id: u64, reason: impl Into<String>) -> Self {
        Self {
            item_id,
            status: OutcomeStatus::Failure(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Success)
    }
}

/// Pool sizing and drain policy. Immutable for the lifetime of one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker units pulling from the queue.
    pub worker_count: usize,
    /// Max jobs held by the queue at once (stop signals included).
    pub queue_capacity: usize,
    /// When set, at most this many workers are inside a write at once.
    pub max_concurrent_active: Option<usize>,
    /// How long the coordinator waits for workers after the last stop signal.
    pub join_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let defaults = PoolDefaults::current();
        let workers = defaults.worker_count;
        Self {
            worker_count: workers,
            queue_capacity: workers * PoolDefaults::QUEUE_SLOTS_PER_WORKER,
            max_concurrent_active: Some(defaults.max_concurrent_for(workers)),
            join_timeout: PoolDefaults::JOIN_TIMEOUT,
        }
    }
}

impl PoolConfig {
    /// Reject configs the pool cannot honor. Called before anything is spawned.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.worker_count == 0 {
            return Err(DispatchError::Config("worker_count must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(DispatchError::Config(
                "queue_capacity must be at least 1".into(),
            ));
        }
        if let Some(max) = self.max_concurrent_active
            && (max == 0 || max > self.worker_count)
        {
            return Err(DispatchError::Config(format!(
                "max_concurrent_active must be in 1..={} (got {})",
                self.worker_count, max
            )));
        }
        Ok(())
    }
}

/// Field precedence for picking an item's category, plus the fallback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryRules {
    pub fields: Vec<String>,
    pub default: String,
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self {
            fields: NamingConsts::CATEGORY_FIELDS
                .iter()
                .map(|f| f.to_string())
                .collect(),
            default: NamingConsts::DEFAULT_CATEGORY.to_string(),
        }
    }
}

/// Where a worker runs its writes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Substrate {
    /// Worker threads call the writer in-process.
    #[default]
    Threads,
    /// Each worker thread drives one child process (`program --worker-stdio`) over JSON lines.
    Processes { program: PathBuf },
}

impl Substrate {
    pub fn is_processes(&self) -> bool {
        matches!(self, Substrate::Processes { .. })
    }
}

/// Coordinator lifecycle. `TimedOut` is only reachable from `Draining`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Submitting,
    Draining,
    Joined,
    TimedOut,
    Reported,
}

impl RunState {
    /// True when `self -> next` is an edge of the coordinator state machine.
    pub fn can_move_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, Submitting)
                | (Submitting, Draining)
                | (Draining, Joined)
                | (Draining, TimedOut)
                | (Joined, Reported)
                | (TimedOut, Reported)
        )
    }
}

/// Final statistics of one run.
#[derive(Clone, Debug)]
pub struct RunSummary {
    /// Items pulled from the source (unreadable rows included).
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Items removed from the queue unprocessed after cancellation. Also counted in `failed`.
    pub discarded: usize,
    pub elapsed: Duration,
    /// `Joined` or `TimedOut`: how the drain phase ended.
    pub drained_via: RunState,
    /// Workers still running when the join timeout expired, ascending.
    pub timed_out_workers: Vec<usize>,
    /// Every outcome recorded before the report, in completion order.
    pub outcomes: Vec<Outcome>,
}

impl RunSummary {
    /// Items with no outcome yet. Non-zero only when the run timed out.
    pub fn unaccounted(&self) -> usize {
        self.submitted
            .saturating_sub(self.succeeded + self.failed)
    }

    pub fn timed_out(&self) -> bool {
        self.drained_via == RunState::TimedOut
    }

    /// Outcomes per second over the whole run.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.succeeded + self.failed) as f64 / secs
        } else {
            0.0
        }
    }

    /// `(item_id, reason)` for every failed outcome.
    pub fn failures(&self) -> Vec<(u64, &str)> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.status {
                OutcomeStatus::Failure(reason) => Some((o.item_id, reason.as_str())),
                OutcomeStatus::Success => None,
            })
            .collect()
    }
}

/// Full run options (CLI and lib).
#[derive(Clone, Debug)]
pub struct Opts {
    /// Output root; one sub-directory per category is created below it.
    pub output: PathBuf,
    pub pool: PoolConfig,
    pub rules: CategoryRules,
    pub substrate: Substrate,
    /// Show progress bar and debug logging.
    pub verbose: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            output: PathBuf::from(NamingConsts::DEFAULT_OUTPUT_DIR),
            pool: PoolConfig::default(),
            rules: CategoryRules::default(),
            substrate: Substrate::default(),
            verbose: false,
        }
    }
}

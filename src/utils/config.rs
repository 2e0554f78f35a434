//! Application configuration constants.
//! Pool tuning, naming rules and thresholds in one place.

use std::sync::OnceLock;
use std::time::Duration;

use crate::utils::fd_limit::max_workers_by_fd_limit;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    config_filename: String,
    worker_thread_prefix: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                config_filename: format!(".{pkg}.toml"),
                worker_thread_prefix: format!("{pkg}-worker"),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// `.cvfanout.toml`, looked up in the current directory.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Thread name for worker `id`.
    pub fn worker_thread_name(&self, id: usize) -> String {
        format!("{}-{}", self.worker_thread_prefix, id)
    }
}

// ---- Worker pool ----

/// Default pool sizing.
/// Use [`PoolDefaults::current()`] to derive `worker_count` from rayon's thread count and the FD limit,
/// and [`PoolDefaults::max_concurrent_for`] for the default write throttle.
#[derive(Clone, Copy, Debug)]
pub struct PoolDefaults {
    /// Available threads (from rayon).
    pub available_threads: usize,
    /// Worker count after multiplier, hard cap and FD cap.
    pub worker_count: usize,
}

impl PoolDefaults {
    /// Writes are I/O bound: run more workers than cores.
    pub const WORKERS_PER_THREAD: usize = 2;
    pub const MAX_WORKERS: usize = 8;
    /// Queue slots per worker when no capacity is given.
    pub const QUEUE_SLOTS_PER_WORKER: usize = 2;
    pub const JOIN_TIMEOUT: Duration = Duration::from_secs(30);
    /// Default throttle lets one write in per this many threads.
    pub const THREADS_PER_ACTIVE_WRITE: usize = 2;

    pub fn current() -> Self {
        let available_threads = rayon::current_num_threads();
        let wanted = (available_threads * Self::WORKERS_PER_THREAD).clamp(1, Self::MAX_WORKERS);
        let worker_count = match max_workers_by_fd_limit() {
            Some(cap) if cap < wanted => {
                log::debug!("Capping workers {} -> {} (FD limit ~80%)", wanted, cap);
                cap
            }
            _ => wanted,
        };
        Self {
            available_threads,
            worker_count,
        }
    }

    /// Default `max_concurrent_active` for a pool of `workers`: half the threads, at least 1,
    /// never more than `workers`.
    pub fn max_concurrent_for(&self, workers: usize) -> usize {
        (self.available_threads / Self::THREADS_PER_ACTIVE_WRITE)
            .max(1)
            .min(workers.max(1))
    }
}

// ---- Naming / layout ----

/// Output layout and category resolution defaults.
pub struct NamingConsts;

impl NamingConsts {
    pub const ARTIFACT_PREFIX: &'static str = "item_";
    pub const ARTIFACT_EXT: &'static str = "txt";
    pub const TEMP_EXT: &'static str = "tmp";
    /// Max characters kept in one sanitized path segment.
    pub const MAX_NAME_CHARS: usize = 100;
    /// Characters that are invalid in a path segment on at least one common filesystem.
    pub const INVALID_NAME_CHARS: &'static [char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
    pub const REPLACEMENT_CHAR: char = '_';
    pub const CATEGORY_FIELDS: &'static [&'static str] = &["Category", "skills", "Titre"];
    pub const DEFAULT_CATEGORY: &'static str = "Unknown";
    pub const DEFAULT_OUTPUT_DIR: &'static str = "cvfanout_out";
    /// Header line template is `=== CV <id> ===`.
    pub const HEADER_LABEL: &'static str = "CV";
}

// ---- Progress ----

pub struct ProgressConsts;

impl ProgressConsts {
    pub const BAR_DESC: &'static str = "Writing";
    pub const BAR_UNIT: &'static str = " items";
}

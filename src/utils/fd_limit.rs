//! Open-file budget used to size the default worker pool (Unix `RLIMIT_NOFILE` soft limit).

/// Descriptors one worker may hold at once. Covers the process substrate, the costlier one:
/// child stdin/stdout pipes, plus the temp file and directory handle on the child side.
pub const FDS_PER_WORKER: usize = 4;

/// Percent of the soft limit the pool plans for. The rest is left to stdio, the CSV reader and logging.
const USABLE_PERCENT: u64 = 80;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FdBudget {
    pub soft_limit: u64,
}

impl FdBudget {
    /// `None` when the limit is unlimited or cannot be read (non-Unix).
    pub fn current() -> Option<Self> {
        soft_nofile_limit().map(|soft_limit| Self { soft_limit })
    }

    pub fn usable(&self) -> u64 {
        self.soft_limit.saturating_mul(USABLE_PERCENT) / 100
    }

    /// Workers that fit at `fds_per_worker` each. Never below 1.
    pub fn max_workers(&self, fds_per_worker: usize) -> usize {
        let per_worker = fds_per_worker.max(1) as u64;
        usize::try_from(self.usable() / per_worker)
            .unwrap_or(usize::MAX)
            .max(1)
    }
}

#[cfg(unix)]
fn soft_nofile_limit() -> Option<u64> {
    let mut rlim = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: getrlimit only writes into the struct it is given.
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut rlim) } != 0 {
        return None;
    }
    if rlim.rlim_cur == libc::RLIM_INFINITY {
        return None;
    }
    Some(rlim.rlim_cur as u64)
}

#[cfg(not(unix))]
fn soft_nofile_limit() -> Option<u64> {
    None
}

/// Default worker cap from the current budget, or `None` when there is no practical limit.
pub fn max_workers_by_fd_limit() -> Option<usize> {
    FdBudget::current().map(|budget| budget.max_workers(FDS_PER_WORKER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_keeps_headroom() {
        let budget = FdBudget { soft_limit: 1024 };
        assert_eq!(budget.usable(), 819);
        assert_eq!(budget.max_workers(FDS_PER_WORKER), 204);
    }

    #[test]
    fn tiny_limit_still_allows_one_worker() {
        let budget = FdBudget { soft_limit: 3 };
        assert_eq!(budget.max_workers(FDS_PER_WORKER), 1);
        assert_eq!(budget.max_workers(0), 2);
    }
}

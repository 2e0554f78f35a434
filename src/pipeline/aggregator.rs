//! Lock-protected outcome tally shared by all workers and read by the coordinator.

use std::sync::{Mutex, PoisonError};

use crate::{Outcome, OutcomeStatus};

/// Snapshot of everything recorded so far.
#[derive(Clone, Debug, Default)]
pub struct Tally {
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<Outcome>,
}

impl Tally {
    pub fn recorded(&self) -> usize {
        self.succeeded + self.failed
    }
}

#[derive(Debug, Default)]
pub struct Aggregator {
    inner: Mutex<Tally>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: Outcome) {
        let mut tally = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match outcome.status {
            OutcomeStatus::Success => tally.succeeded += 1,
            OutcomeStatus::Failure(_) => tally.failed += 1,
        }
        tally.outcomes.push(outcome);
    }

    pub fn snapshot(&self) -> Tally {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

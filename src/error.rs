//! Error taxonomy: source errors abort a run, item errors become failed outcomes.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The input dataset cannot be opened or its header read. Fatal, raised before any worker starts.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot open source {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("cannot read header row of {}: {source}", path.display())]
    Header {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("cannot read workbook {}: {source}", path.display())]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },
    #[error("workbook {} has no worksheet", path.display())]
    NoSheet { path: PathBuf },
}

/// A single source row that could not be turned into a [`WorkItem`](crate::WorkItem).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("row {id}: {reason}")]
pub struct RowError {
    pub id: u64,
    pub reason: String,
}

/// Failure while handling one item. Recovered at the worker boundary.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("unreadable row: {0}")]
    Row(String),
    #[error("create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("rename {} -> {}: {source}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("worker process: {0}")]
    Worker(String),
    #[error("panic: {0}")]
    Panic(String),
    #[error("discarded: run cancelled")]
    Discarded,
}

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("invalid pool config: {0}")]
    Config(String),
    #[error("cannot start worker {worker}: {source}")]
    Spawn {
        worker: usize,
        #[source]
        source: io::Error,
    },
}

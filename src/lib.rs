//! cvfanout: fan tabular records out into per-category text files.
//!
//! A single feeder pushes rows through a bounded queue to a fixed pool of workers. Each worker
//! writes one artifact per row with an atomic temp-file rename. The coordinator waits for the
//! pool with a bounded timeout and reports per-item outcomes.

pub mod engine;
pub mod error;
pub mod pipeline;
pub mod source;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use error::{DispatchError, ItemError, RowError, SourceError};
pub use pipeline::{CancelToken, Coordinator, Progress};
pub use source::{CsvSource, ExcelSource, TableSource};

use log::{debug, warn};
use std::path::Path;

/// Result alias used by public cvfanout API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Single entry point: read `input` (CSV, or the first sheet of an `.xlsx`/`.xls`/`.ods`
/// workbook, with a header row) and write one artifact per row under `opts.output`.
///
/// The source is opened before any worker starts; failing to open it is the only input error
/// that aborts the run, reported as [`DispatchError::Source`]. Pass `cancel: Some(token)` to stop
/// submission early (e.g. from Ctrl+C).
///
/// Workers that miss the join timeout are waited for before returning, so no write is cut short
/// when the caller exits right after.
pub fn fan_out_file(input: &Path, opts: &Opts, cancel: Option<CancelToken>) -> Result<RunSummary> {
    let source = TableSource::open(input).map_err(DispatchError::from)?;
    debug!(
        "{}: {} columns: {:?}",
        input.display(),
        source.headers().len(),
        source.headers()
    );

    let mut coordinator = Coordinator::new(&opts.output, opts.pool.clone())
        .with_rules(opts.rules.clone())
        .with_substrate(opts.substrate.clone())
        .with_progress(match (opts.verbose, source.len_hint()) {
            (false, _) => Progress::Off,
            (true, Some(total)) => Progress::Total(total),
            (true, None) => Progress::Counter,
        });
    if let Some(cancel) = cancel {
        coordinator = coordinator.with_cancel(cancel);
    }
    let summary = coordinator.run(source)?;

    let stragglers = coordinator.take_stragglers();
    if !stragglers.is_empty() {
        warn!(
            "waiting for worker(s) {:?} to finish in-flight writes",
            stragglers.ids()
        );
        let joined = stragglers.join();
        debug!("{} straggler(s) finished", joined);
    }
    Ok(summary)
}

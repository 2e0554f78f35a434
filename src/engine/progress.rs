//! Progress bar utilities for displaying dispatch status

use kdam::{Animation, Bar, BarExt};
use std::sync::{Arc, Mutex, PoisonError};

use crate::utils::config::ProgressConsts;

// Progress bar type alias
pub type ProgressBar = Arc<Mutex<Bar>>;

/// Percentage bar over a known item count.
pub fn create_progress_bar(total: usize) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = total,
        desc = ProgressConsts::BAR_DESC,
        animation = Animation::Classic,
        unit = ProgressConsts::BAR_UNIT
    )))
}

/// Counter for unknown total (shows count without percentage)
pub fn create_counter() -> ProgressBar {
    let bar = Arc::new(Mutex::new(kdam::tqdm!(
        total = 0,
        desc = ProgressConsts::BAR_DESC,
        animation = Animation::Classic,
        position = 0,
        unit = ProgressConsts::BAR_UNIT
    )));
    refresh_bar(&bar);
    bar
}

/// Force a refresh of the bar (e.g. so counter shows "0 items" immediately).
pub fn refresh_bar(pb: &ProgressBar) {
    if let Ok(mut bar) = pb.try_lock() {
        let _ = bar.refresh();
    }
}

/// Add `n` completed items. Blocks briefly on contention so no completion is lost.
pub fn update_progress_bar(pb: &ProgressBar, n: usize) {
    let mut bar = pb.lock().unwrap_or_else(PoisonError::into_inner);
    let _ = bar.update(n);
}

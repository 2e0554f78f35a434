//! Named-artifact writer: one item in, one durably written file out.
//!
//! Directory creation is idempotent under concurrent callers; content goes to a colocated temp
//! file that is synced and renamed into place, so readers never see a partial artifact.

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::ItemError;
use crate::utils::config::NamingConsts;
use crate::utils::tempfiles::{rename_temp_to_final, temp_path_for};
use crate::{WorkItem, WriteRequest};

/// Create `dir` and its parents if absent. Existing directories (including ones another worker
/// creates concurrently) are success.
pub fn ensure_dir(dir: &Path) -> Result<(), ItemError> {
    fs::create_dir_all(dir).map_err(|source| ItemError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// `=== CV <id> ===` followed by one `name: value` line per field, in field order.
pub fn render(item: &WorkItem) -> String {
    let mut out = format!("=== {} {} ===\n", NamingConsts::HEADER_LABEL, item.id);
    for (name, value) in &item.fields {
        let _ = writeln!(out, "{name}: {value}");
    }
    out
}

/// Write `contents` to a temp file next to `final_path`, sync it, then rename it into place.
pub fn write_atomic(final_path: &Path, contents: &[u8]) -> Result<(), ItemError> {
    let temp_path = temp_path_for(final_path);
    let written = File::create(&temp_path).and_then(|mut f| {
        f.write_all(contents)?;
        f.sync_all()
    });
    if let Err(source) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(ItemError::Write {
            path: temp_path,
            source,
        });
    }
    rename_temp_to_final(&temp_path, final_path)
}

/// Full write for one request. Returns the final artifact path.
pub fn write_artifact(req: &WriteRequest) -> Result<PathBuf, ItemError> {
    let dir = req.destination.dir();
    ensure_dir(&dir)?;
    let final_path = req.destination.file_path(req.item.id);
    write_atomic(&final_path, render(&req.item).as_bytes())?;
    Ok(final_path)
}

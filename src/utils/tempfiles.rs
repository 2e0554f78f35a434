use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ItemError;
use crate::utils::config::NamingConsts;

/// Temp path colocated with `final_path`: `.<name>.<pid>.tmp` in the same directory, so the
/// rename never crosses filesystems and concurrent runs never share a temp file.
pub fn temp_path_for(final_path: &Path) -> PathBuf {
    let name = final_path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    final_path.parent().unwrap_or(Path::new(".")).join(format!(
        ".{name}.{}.{}",
        std::process::id(),
        NamingConsts::TEMP_EXT
    ))
}

/// Move a fully written temp file into place. Removes the temp file when the rename fails.
pub fn rename_temp_to_final(temp_path: &Path, final_path: &Path) -> Result<(), ItemError> {
    fs::rename(temp_path, final_path).map_err(|source| {
        let _ = fs::remove_file(temp_path);
        ItemError::Rename {
            from: temp_path.to_path_buf(),
            to: final_path.to_path_buf(),
            source,
        }
    })
}

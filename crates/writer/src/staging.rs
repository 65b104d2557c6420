//! Temp path allocation

use std::io;
use std::path::{Path, PathBuf};

use batchwrite_config::TempLocation;
use uuid::Uuid;

/// Directory that receives the temp file for `resolved_target`.
///
/// # Errors
///
/// Returns an error if a relative staging directory cannot be made absolute.
pub fn staging_dir(location: &TempLocation, resolved_target: &Path) -> io::Result<PathBuf> {
    match location {
        TempLocation::System => Ok(std::env::temp_dir()),
        TempLocation::Sibling => Ok(resolved_target
            .parent()
            .map_or_else(|| PathBuf::from("/"), Path::to_path_buf)),
        TempLocation::Directory(dir) => std::path::absolute(dir),
    }
}

/// A fresh temp file path inside `dir`. Names never repeat within a process.
#[must_use]
pub fn temp_path_in(dir: &Path, prefix: &str) -> PathBuf {
    dir.join(format!("{prefix}{}", Uuid::new_v4().simple()))
}

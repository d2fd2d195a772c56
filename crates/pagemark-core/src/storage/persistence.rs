//! File persistence helpers
//!
//! Uses atomic writes (write to temp file, then rename) to prevent corruption.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use super::error::{IoOp, StorageError, StorageResult};

/// Read a file, returning `None` if it does not exist
pub(crate) fn read_if_exists(path: &Path) -> StorageResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::from_io(IoOp::Read, path, e)),
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
///
/// The target file is never left in a partially-written state.
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    let failed = |at: &Path| {
        let at = at.to_path_buf();
        move |e| StorageError::from_io(IoOp::Write, at, e)
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(failed(parent))?;
    }

    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path).map_err(failed(&temp_path))?;
    file.write_all(data).map_err(failed(&temp_path))?;
    file.sync_all().map_err(failed(&temp_path))?;

    fs::rename(&temp_path, path).map_err(failed(path))
}

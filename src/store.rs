//! Append-only persistence helpers shared by weights, reports and sweep tables.
//!
//! Nothing here overwrites: an existing destination is reported as
//! `MagnifierError::PathConflict`.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{MagnifierError, Result};

/// Creates `path` (and its parents) as a brand new directory.
pub(crate) fn create_new_dir(path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| MagnifierError::io(parent, e))?;
    }
    match fs::create_dir(path) {
        Ok(()) => Ok(path.to_path_buf()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            Err(MagnifierError::PathConflict { path: path.to_path_buf() })
        }
        Err(e) => Err(MagnifierError::io(path, e)),
    }
}

/// Opens `path` for writing, failing if anything is already there.
pub(crate) fn create_new_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| MagnifierError::io(parent, e))?;
    }
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                MagnifierError::PathConflict { path: path.to_path_buf() }
            } else {
                MagnifierError::io(path, e)
            }
        })
}

/// Serializes `value` as pretty-printed JSON into a new file.
pub(crate) fn write_new_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = create_new_file(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, value).map_err(|e| MagnifierError::json(path, e))
}

/// Writes every row as one CSV record (header derived from the field names).
pub(crate) fn write_new_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let file = create_new_file(path)?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    for row in rows {
        writer.serialize(row).map_err(|e| MagnifierError::csv(path, e))?;
    }
    writer.flush().map_err(|e| MagnifierError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_create_is_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/report");
        create_new_dir(&target).unwrap();
        assert!(matches!(
            create_new_dir(&target),
            Err(MagnifierError::PathConflict { .. })
        ));

        let file = dir.path().join("nested/table.json");
        write_new_json(&file, &[1, 2, 3]).unwrap();
        assert!(matches!(
            write_new_json(&file, &[4]),
            Err(MagnifierError::PathConflict { .. })
        ));
    }
}

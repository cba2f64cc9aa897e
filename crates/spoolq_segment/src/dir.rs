//! Queue directory management.
//!
//! Every queue lives in its own directory:
//!
//! ```text
//! <parent>/<name>/
//! ├─ LOCK                 # Advisory lock for a single open handle
//! ├─ 0000000000001.seg    # Oldest segment (head)
//! ├─ 0000000000002.seg
//! └─ 0000000000003.seg    # Newest segment (tail)
//! ```
//!
//! Segment numbers only grow; exhausted head segments are deleted.

use crate::error::{SegmentError, SegmentResult};
use crate::file::FileBackend;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Component, Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const SEGMENT_EXTENSION: &str = "seg";

/// Owns a queue directory and holds its exclusive lock.
///
/// The lock is released when the `QueueDir` is dropped.
#[derive(Debug)]
pub struct QueueDir {
    path: PathBuf,
    _lock_file: File,
}

impl QueueDir {
    /// Opens or creates the directory for queue `name` under `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `name` is not a single normal path component (`InvalidName`)
    /// - another handle holds the lock (`Locked`)
    /// - I/O errors occur
    pub fn open(parent: &Path, name: &str) -> SegmentResult<Self> {
        validate_name(name)?;

        let path = parent.join(name);
        fs::create_dir_all(&path)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(SegmentError::Locked);
        }

        Ok(Self {
            path,
            _lock_file: lock_file,
        })
    }

    /// Returns the queue directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of segment `number`.
    #[must_use]
    pub fn segment_path(&self, number: u64) -> PathBuf {
        self.path.join(format!("{number:013}.{SEGMENT_EXTENSION}"))
    }

    /// Lists existing segment numbers in ascending order.
    ///
    /// Files that do not look like segments are ignored.
    pub fn segment_numbers(&self) -> SegmentResult<Vec<u64>> {
        let mut numbers = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SEGMENT_EXTENSION) {
                continue;
            }
            if let Some(number) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
            {
                numbers.push(number);
            }
        }
        numbers.sort_unstable();
        Ok(numbers)
    }

    /// Creates a new, empty segment file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file already exists or cannot be created.
    pub fn create_segment(&self, number: u64) -> SegmentResult<FileBackend> {
        FileBackend::create(&self.segment_path(number))
    }

    /// Opens an existing segment file.
    pub fn open_segment(&self, number: u64) -> SegmentResult<FileBackend> {
        FileBackend::open(&self.segment_path(number))
    }

    /// Deletes a segment file. Missing files are not an error.
    pub fn remove_segment(&self, number: u64) -> SegmentResult<()> {
        match fs::remove_file(self.segment_path(number)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Fsyncs the directory so segment creations and deletions are durable.
    ///
    /// Skipped on platforms without directory fsync.
    #[cfg(unix)]
    pub fn sync(&self) -> SegmentResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    /// Fsyncs the directory so segment creations and deletions are durable.
    ///
    /// Skipped on platforms without directory fsync.
    #[cfg(not(unix))]
    pub fn sync(&self) -> SegmentResult<()> {
        Ok(())
    }
}

fn validate_name(name: &str) -> SegmentResult<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(SegmentError::InvalidName(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory_and_lock() {
        let parent = tempdir().unwrap();
        let dir = QueueDir::open(parent.path(), "jobs").unwrap();

        assert_eq!(dir.path(), parent.path().join("jobs"));
        assert!(dir.path().join(LOCK_FILE).exists());
        assert!(dir.segment_numbers().unwrap().is_empty());
    }

    #[test]
    fn second_open_is_locked() {
        let parent = tempdir().unwrap();
        let _first = QueueDir::open(parent.path(), "jobs").unwrap();

        let second = QueueDir::open(parent.path(), "jobs");
        assert!(matches!(second, Err(SegmentError::Locked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let parent = tempdir().unwrap();
        drop(QueueDir::open(parent.path(), "jobs").unwrap());
        assert!(QueueDir::open(parent.path(), "jobs").is_ok());
    }

    #[test]
    fn rejects_bad_names() {
        let parent = tempdir().unwrap();
        for name in ["", "..", "a/b", "/abs"] {
            let result = QueueDir::open(parent.path(), name);
            assert!(
                matches!(result, Err(SegmentError::InvalidName(_))),
                "{name:?} accepted"
            );
        }
    }

    #[test]
    fn lists_segments_sorted() {
        let parent = tempdir().unwrap();
        let dir = QueueDir::open(parent.path(), "jobs").unwrap();

        for number in [3, 1, 12] {
            dir.create_segment(number).unwrap();
        }
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        assert_eq!(dir.segment_numbers().unwrap(), vec![1, 3, 12]);
        assert!(dir.segment_path(12).ends_with("0000000000012.seg"));

        dir.remove_segment(3).unwrap();
        dir.remove_segment(3).unwrap();
        assert_eq!(dir.segment_numbers().unwrap(), vec![1, 12]);
        dir.sync().unwrap();
    }
}

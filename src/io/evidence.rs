//! Local store for incorrect-posture evidence
//!
//! Every alert saves the triggering frame as `<n>.<ext>` in one directory.
//! Files stay there until the end-of-session upload succeeds, then exactly
//! the uploaded files are removed. Numbering continues after the highest existing file so
//! leftovers from an earlier session are never overwritten.

use crate::io::source::Frame;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("failed to create evidence directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write evidence file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to list evidence directory {path}")]
    List {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove evidence file {path}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("evidence directory still holds {remaining} file(s) after cleanup")]
    NotEmpty { remaining: usize },
}

/// Directory of captured frames awaiting upload
#[derive(Debug)]
pub struct EvidenceStore {
    dir: PathBuf,
    next: u64,
}

impl EvidenceStore {
    /// Open a store rooted at `dir`. The directory is created lazily on
    /// the first save.
    pub fn open<P: Into<PathBuf>>(dir: P) -> Result<Self, EvidenceError> {
        let dir = dir.into();
        let next = if dir.is_dir() {
            Self::scan(&dir)?
                .iter()
                .filter_map(|p| file_number(p))
                .max()
                .map_or(0, |n| n + 1)
        } else {
            0
        };
        debug!(dir = %dir.display(), next = %next, "evidence_store_opened");
        Ok(Self { dir, next })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save a frame and return the path it was written to
    pub fn save(&mut self, frame: &Frame) -> Result<PathBuf, EvidenceError> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)
                .map_err(|source| EvidenceError::CreateDir { path: self.dir.clone(), source })?;
        }

        let path = self.dir.join(format!("{}.{}", self.next, frame.format.extension()));
        fs::write(&path, &frame.image)
            .map_err(|source| EvidenceError::Write { path: path.clone(), source })?;
        self.next += 1;

        debug!(path = %path.display(), seq = %frame.seq, bytes = %frame.image.len(), "evidence_saved");
        Ok(path)
    }

    /// All stored files, ordered by their number
    pub fn list(&self) -> Result<Vec<PathBuf>, EvidenceError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Self::scan(&self.dir)?;
        files.sort_by_key(|p| (file_number(p).unwrap_or(u64::MAX), p.clone()));
        Ok(files)
    }

    pub fn is_empty(&self) -> Result<bool, EvidenceError> {
        Ok(self.list()?.is_empty())
    }

    /// Delete the given files (normally the ones just uploaded). Numbering
    /// restarts at 0 once the directory is empty.
    pub fn remove(&mut self, files: &[PathBuf]) -> Result<usize, EvidenceError> {
        for path in files {
            fs::remove_file(path)
                .map_err(|source| EvidenceError::Remove { path: path.clone(), source })?;
        }
        if self.is_empty()? {
            self.next = 0;
        }
        info!(dir = %self.dir.display(), removed = %files.len(), "evidence_removed");
        Ok(files.len())
    }

    /// Confirm the store holds no files
    pub fn verify_empty(&self) -> Result<(), EvidenceError> {
        match self.list()?.len() {
            0 => Ok(()),
            remaining => Err(EvidenceError::NotEmpty { remaining }),
        }
    }

    fn scan(dir: &Path) -> Result<Vec<PathBuf>, EvidenceError> {
        let list_err = |source| EvidenceError::List { path: dir.to_path_buf(), source };
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(list_err)? {
            let path = entry.map_err(list_err)?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        Ok(files)
    }
}

fn file_number(path: &Path) -> Option<u64> {
    path.file_stem()?.to_str()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::source::ImageFormat;
    use bytes::Bytes;
    use tempfile::tempdir;

    fn jpeg(seq: u64) -> Frame {
        Frame::new(seq, Bytes::from_static(b"\xff\xd8frame"), ImageFormat::Jpeg)
    }

    #[test]
    fn test_save_numbers_files_in_order() {
        let dir = tempdir().unwrap();
        let mut store = EvidenceStore::open(dir.path().join("evidence")).unwrap();

        let first = store.save(&jpeg(7)).unwrap();
        let second = store.save(&jpeg(9)).unwrap();

        assert_eq!(first.file_name().unwrap(), "0.jpg");
        assert_eq!(second.file_name().unwrap(), "1.jpg");
        assert_eq!(fs::read(&first).unwrap(), b"\xff\xd8frame");
        assert_eq!(store.list().unwrap(), vec![first, second]);
    }

    #[test]
    fn test_list_sorts_numerically() {
        let dir = tempdir().unwrap();
        let mut store = EvidenceStore::open(dir.path()).unwrap();
        for seq in 0..12 {
            store.save(&jpeg(seq)).unwrap();
        }
        let names: Vec<_> = store
            .list()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names[1], "1.jpg");
        assert_eq!(names[2], "2.jpg");
        assert_eq!(names[11], "11.jpg");
    }

    #[test]
    fn test_reopen_continues_after_leftovers() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("4.png"), b"old").unwrap();

        let mut store = EvidenceStore::open(dir.path()).unwrap();
        let path = store.save(&jpeg(0)).unwrap();

        assert_eq!(path.file_name().unwrap(), "5.jpg");
        assert_eq!(fs::read(dir.path().join("4.png")).unwrap(), b"old");
    }

    #[test]
    fn test_remove_empties_store() {
        let dir = tempdir().unwrap();
        let mut store = EvidenceStore::open(dir.path()).unwrap();
        store.save(&jpeg(0)).unwrap();
        store.save(&jpeg(1)).unwrap();

        let files = store.list().unwrap();
        assert_eq!(store.remove(&files).unwrap(), 2);
        assert!(store.verify_empty().is_ok());
        assert_eq!(store.save(&jpeg(2)).unwrap().file_name().unwrap(), "0.jpg");
    }

    #[test]
    fn test_file_added_after_listing_is_reported() {
        let dir = tempdir().unwrap();
        let mut store = EvidenceStore::open(dir.path()).unwrap();
        store.save(&jpeg(0)).unwrap();
        let uploaded = store.list().unwrap();
        let late = store.save(&jpeg(1)).unwrap();

        assert_eq!(store.remove(&uploaded).unwrap(), 1);
        assert!(matches!(store.verify_empty(), Err(EvidenceError::NotEmpty { remaining: 1 })));
        assert!(late.exists());
        // numbering continues while files remain
        assert_eq!(store.save(&jpeg(2)).unwrap().file_name().unwrap(), "2.jpg");
    }

    #[test]
    fn test_missing_directory_lists_empty() {
        let dir = tempdir().unwrap();
        let mut store = EvidenceStore::open(dir.path().join("never-created")).unwrap();
        assert!(store.list().unwrap().is_empty());
        assert_eq!(store.remove(&[]).unwrap(), 0);
        assert!(store.verify_empty().is_ok());
    }
}

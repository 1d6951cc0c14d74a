//! Single-instance run lock backed by an advisory file lock.
//!
//! The lock lives as long as the open handle inside [`RunLock`]; dropping
//! the guard (or the process exiting) closes the handle and releases it.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct RunLock {
    _file: File,
    path: PathBuf,
}

impl RunLock {
    /// Take the lock without waiting. Returns `None` when another holder
    /// already has it. The lock file is created if absent.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        let file = open_lock_file(path)?;
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(Self {
                _file: file,
                path: path.to_path_buf(),
            })),
            Err(e) if is_contended(&e) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to lock {}", path.display())),
        }
    }

    /// Block until the lock can be taken.
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        FileExt::lock_exclusive(&file)
            .with_context(|| format!("Failed to lock {}", path.display()))?;
        Ok(Self {
            _file: file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Whether a run currently holds the lock at `path`.
///
/// Probes with a separate handle that is released straight away, so an
/// in-progress run is never disturbed. A missing lock file means idle.
pub fn is_processing(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    let file = File::open(path)
        .with_context(|| format!("Failed to open lock file {}", path.display()))?;
    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => Ok(false),
        Err(e) if is_contended(&e) => Ok(true),
        Err(e) => Err(e).with_context(|| format!("Failed to probe {}", path.display())),
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open lock file {}", path.display()))
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".upload.lock");

        let first = RunLock::try_acquire(&path).unwrap();
        assert!(first.is_some());
        assert!(path.exists());

        let second = RunLock::try_acquire(&path).unwrap();
        assert!(second.is_none());

        drop(first);
        assert!(RunLock::try_acquire(&path).unwrap().is_some());
    }

    #[test]
    fn test_probe_does_not_release_holder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".upload.lock");

        assert!(!is_processing(&path).unwrap());

        let held = RunLock::try_acquire(&path).unwrap().unwrap();
        assert!(is_processing(&path).unwrap());
        assert!(is_processing(&path).unwrap());
        assert!(RunLock::try_acquire(&path).unwrap().is_none());
        assert_eq!(held.path(), path.as_path());

        drop(held);
        assert!(!is_processing(&path).unwrap());
    }

    #[test]
    fn test_blocking_acquire_when_free() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".upload.lock");

        let lock = RunLock::acquire(&path).unwrap();
        assert!(is_processing(&path).unwrap());
        drop(lock);
    }
}

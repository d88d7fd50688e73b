// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Advisory file lock guarding the store file.
//!
//! Writers (including backup rotation) hold the exclusive lock for the whole
//! write-then-rename; readers hold the shared lock while reading. The lock is
//! released when the guard drops.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use fs2::FileExt;

/// RAII guard over an `flock`-style advisory lock.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
}

impl StoreLock {
    /// Block until the exclusive lock is held.
    pub fn exclusive(path: &Path) -> io::Result<Self> {
        let file = Self::open(path)?;
        FileExt::lock_exclusive(&file)?;
        Ok(Self { file })
    }

    /// Block until a shared lock is held.
    pub fn shared(path: &Path) -> io::Result<Self> {
        let file = Self::open(path)?;
        FileExt::lock_shared(&file)?;
        Ok(Self { file })
    }

    fn open(path: &Path) -> io::Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_lock_blocks_other_writers_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.lock");

        let guard = StoreLock::exclusive(&path).unwrap();
        let other_handle = OpenOptions::new().read(true).open(&path).unwrap();
        assert!(FileExt::try_lock_exclusive(&other_handle).is_err());

        drop(guard);
        assert!(FileExt::try_lock_exclusive(&other_handle).is_ok());
        FileExt::unlock(&other_handle).unwrap();
    }

    #[test]
    fn shared_locks_coexist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.lock");

        let _a = StoreLock::shared(&path).unwrap();
        let _b = StoreLock::shared(&path).unwrap();
        let other_handle = OpenOptions::new().read(true).open(&path).unwrap();
        assert!(FileExt::try_lock_exclusive(&other_handle).is_err());
    }
}

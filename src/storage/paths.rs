// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the store layout.

use std::path::{Path, PathBuf};

/// File name of the primary store file.
pub const STORE_FILE: &str = "ledger.vault";

/// Sibling file holding the advisory lock.
pub const LOCK_FILE: &str = "ledger.lock";

/// Storage path utilities for a store directory.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl StoragePaths {
    /// Create a new StoragePaths rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Primary Store ==========

    /// Path to the primary store file.
    pub fn store_file(&self) -> PathBuf {
        self.root.join(STORE_FILE)
    }

    /// Path to the advisory lock file.
    pub fn lock_file(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    // ========== Backups ==========

    /// Directory containing backup snapshots.
    pub fn backups_dir(&self) -> PathBuf {
        self.root.join("backups")
    }

    /// File name of the snapshot with the given rotation index.
    ///
    /// Zero-padded so a directory listing sorts by index.
    pub fn snapshot_file_name(index: u64) -> String {
        format!("snapshot-{index:010}.vault")
    }

    /// Path to the snapshot with the given rotation index.
    pub fn snapshot(&self, index: u64) -> PathBuf {
        self.backups_dir().join(Self::snapshot_file_name(index))
    }
}

/// Sibling temp path used for write-then-rename.
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_rooted() {
        let paths = StoragePaths::new("/tmp/vault");
        assert_eq!(paths.store_file(), PathBuf::from("/tmp/vault/ledger.vault"));
        assert_eq!(paths.lock_file(), PathBuf::from("/tmp/vault/ledger.lock"));
        assert_eq!(
            paths.snapshot(42),
            PathBuf::from("/tmp/vault/backups/snapshot-0000000042.vault")
        );
    }

    #[test]
    fn temp_path_appends_suffix() {
        assert_eq!(
            temp_path(Path::new("/a/ledger.vault")),
            PathBuf::from("/a/ledger.vault.tmp")
        );
    }
}

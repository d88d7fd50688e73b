// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Backup Rotator
//!
//! Background task that snapshots the store on a fixed interval, in addition
//! to the optional snapshot after every write batch.
//!
//! Each sweep runs [`EncryptedStore::snapshot`] on the blocking pool. The
//! snapshot holds the store's exclusive lock for the whole copy, so it never
//! sees a half-written file, and prunes beyond the retention count.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::EncryptedStore;
use crate::config::MIN_ROTATION_INTERVAL;

/// Background snapshot rotation for an encrypted store.
pub struct BackupRotator {
    store: Arc<EncryptedStore>,
    interval: Duration,
}

impl BackupRotator {
    /// A zero `interval` is replaced by [`MIN_ROTATION_INTERVAL`].
    pub fn new(store: Arc<EncryptedStore>, interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            MIN_ROTATION_INTERVAL
        } else {
            interval
        };
        Self { store, interval }
    }

    /// Run the rotation loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(rotator.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            retention = self.store.retention(),
            "Backup rotator starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Backup rotator shutting down");
                    return;
                }
            }

            self.rotate_step().await;
        }
    }

    /// Take one snapshot on the blocking pool.
    async fn rotate_step(&self) {
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || store.snapshot()).await {
            Ok(Ok(snapshot)) => {
                info!(index = snapshot.index, "Backup rotator: snapshot taken");
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Backup rotator: snapshot failed");
            }
            Err(e) => {
                warn!(error = %e, "Backup rotator: snapshot task panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;

    #[tokio::test]
    async fn rotates_until_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            Arc::new(EncryptedStore::open(StoragePaths::new(dir.path()), 2, false).unwrap());
        let shutdown = CancellationToken::new();

        let rotator = BackupRotator::new(Arc::clone(&store), Duration::from_millis(20));
        let handle = tokio::spawn(rotator.run(shutdown.clone()));

        // Wait for at least three sweeps, so pruning has kicked in.
        for _ in 0..250 {
            let newest = store.list_snapshots().unwrap().last().map(|s| s.index);
            if newest.is_some_and(|i| i >= 2) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        shutdown.cancel();
        handle.await.unwrap();

        let snapshots = store.list_snapshots().unwrap();
        assert_eq!(snapshots.len(), 2);
        assert!(snapshots[1].index >= 2);
    }

    #[test]
    fn zero_interval_is_raised() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            Arc::new(EncryptedStore::open(StoragePaths::new(dir.path()), 2, false).unwrap());
        let rotator = BackupRotator::new(store, Duration::ZERO);
        assert_eq!(rotator.interval, MIN_ROTATION_INTERVAL);
    }

    #[tokio::test]
    async fn cancelled_before_first_tick_takes_no_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            Arc::new(EncryptedStore::open(StoragePaths::new(dir.path()), 2, false).unwrap());
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        BackupRotator::new(Arc::clone(&store), Duration::from_secs(3600))
            .run(shutdown)
            .await;

        assert!(store.list_snapshots().unwrap().is_empty());
    }
}

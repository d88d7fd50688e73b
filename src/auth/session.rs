// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-login session context.
//!
//! A [`Session`] is the only holder of a decrypted store key. It is created
//! by [`crate::vault::Vault::start_session`] after an AuthGate succeeded and
//! is threaded explicitly through every store and repository call.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::UserIdentity;
use crate::crypto::StoreKey;
use crate::error::{VaultError, VaultResult};

struct KeySlot {
    key: Option<StoreKey>,
    last_activity: Instant,
}

/// Authenticated user plus the store key, evicted on logout or idle timeout.
pub struct Session {
    identity: UserIdentity,
    idle_timeout: Duration,
    slot: Mutex<KeySlot>,
}

impl Session {
    pub(crate) fn new(identity: UserIdentity, key: StoreKey, idle_timeout: Duration) -> Self {
        Self {
            identity,
            idle_timeout,
            slot: Mutex::new(KeySlot {
                key: Some(key),
                last_activity: Instant::now(),
            }),
        }
    }

    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    pub fn user_id(&self) -> &str {
        &self.identity.user_id
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Return the store key and record activity.
    ///
    /// Fails with `Reauthenticate` once the key was evicted. An idle period
    /// longer than the timeout evicts the key first.
    pub fn key(&self) -> VaultResult<StoreKey> {
        let mut slot = self.lock();
        if slot.key.is_some() && slot.last_activity.elapsed() > self.idle_timeout {
            slot.key = None;
            warn!(user_id = %self.identity.user_id, "Session idle timeout, store key evicted");
        }
        let key = slot.key.clone().ok_or(VaultError::Reauthenticate)?;
        slot.last_activity = Instant::now();
        Ok(key)
    }

    /// Whether the key is still held and not idle-expired. Does not count as
    /// activity.
    pub fn is_active(&self) -> bool {
        let slot = self.lock();
        slot.key.is_some() && slot.last_activity.elapsed() <= self.idle_timeout
    }

    /// Evict the key (logout). Idempotent.
    pub fn end(&self) {
        let mut slot = self.lock();
        if slot.key.take().is_some() {
            info!(user_id = %self.identity.user_id, "Session ended");
        }
    }

    fn lock(&self) -> MutexGuard<'_, KeySlot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("idle_timeout", &self.idle_timeout)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.end();
    }
}

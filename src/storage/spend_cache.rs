// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! LRU cache of per-category monthly spend.
//!
//! Utilization reads hit this cache; every repository write that touches a
//! (category, period) pair invalidates that entry before returning, so a
//! cached value always equals a fresh recomputation.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use lru::LruCache;
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use crate::models::Period;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpendKey {
    pub user_id: String,
    pub category_id: Uuid,
    pub period: Period,
}

impl SpendKey {
    pub fn new(user_id: &str, category_id: Uuid, period: Period) -> Self {
        Self {
            user_id: user_id.to_string(),
            category_id,
            period,
        }
    }
}

/// In-process LRU cache of spent amounts.
pub struct SpendCache {
    cache: Mutex<LruCache<SpendKey, Decimal>>,
}

impl SpendCache {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<SpendKey, Decimal>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &SpendKey) -> Option<Decimal> {
        let hit = self.lock().get(key).copied();
        if hit.is_some() {
            debug!(category_id = %key.category_id, period = %key.period, "Spend cache hit");
        }
        hit
    }

    pub fn put(&self, key: SpendKey, spent: Decimal) {
        self.lock().put(key, spent);
    }

    pub fn invalidate(&self, key: &SpendKey) {
        if self.lock().pop(key).is_some() {
            debug!(category_id = %key.category_id, period = %key.period, "Spend cache invalidated");
        }
    }

    /// Drop every entry of one category for a user.
    pub fn invalidate_category(&self, user_id: &str, category_id: Uuid) {
        self.retain(|k| !(k.user_id == user_id && k.category_id == category_id));
    }

    /// Drop every entry of a user.
    pub fn invalidate_user(&self, user_id: &str) {
        self.retain(|k| k.user_id != user_id);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn retain(&self, keep: impl Fn(&SpendKey) -> bool) {
        let mut cache = self.lock();
        let stale: Vec<SpendKey> = cache
            .iter()
            .filter(|(k, _)| !keep(k))
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale {
            cache.pop(&key);
        }
    }
}

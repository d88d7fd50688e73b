// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared helpers for unit tests.

use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tempfile::TempDir;
use uuid::Uuid;

use crate::auth::{Credentials, Session};
use crate::config::VaultConfig;
use crate::crypto::KdfParams;
use crate::models::{BudgetBucket, Category, CategoryKind, Period, Transaction};
use crate::vault::Vault;

pub const TEST_PASSWORD: &str = "password123";

/// Cheap Argon2id settings; never use outside tests.
pub fn fast_kdf() -> KdfParams {
    KdfParams {
        salt: [7u8; 16],
        mem_cost: 64,
        time_cost: 1,
        parallelism: 1,
    }
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// The last complete month, so every day in it is a valid past date.
pub fn last_month() -> Period {
    Period::of(Utc::now().date_naive()).prev()
}

pub fn test_config(dir: &TempDir) -> VaultConfig {
    let mut config = VaultConfig::with_data_dir(dir.path());
    config.snapshot_on_write = false;
    config.kdf = fast_kdf();
    config
}

pub fn test_vault() -> (TempDir, Vault) {
    let dir = tempfile::tempdir().unwrap();
    let vault = Vault::open(test_config(&dir)).unwrap();
    (dir, vault)
}

/// Register `username` and open a session for it.
pub fn login(vault: &Vault, username: &str) -> Session {
    let gate = vault.auth_gate();
    gate.register(username, TEST_PASSWORD).unwrap();
    vault
        .login(&gate, &Credentials::new(username, TEST_PASSWORD))
        .unwrap()
}

pub const TEST_OWNER: &str = "user-test";

/// Detached category for pure computations.
pub fn category(name: &str, kind: CategoryKind) -> Category {
    Category {
        id: Uuid::new_v4(),
        owner_user_id: TEST_OWNER.to_string(),
        name: name.to_string(),
        kind,
        bucket: BudgetBucket::infer(name),
        created_at: Utc::now(),
    }
}

/// Detached transaction for pure computations.
pub fn tx(category: &Category, amount: &str, date: NaiveDate) -> Transaction {
    Transaction {
        id: Uuid::new_v4(),
        owner_user_id: TEST_OWNER.to_string(),
        amount: dec(amount),
        category_id: category.id,
        date,
        note: None,
        created_at: Utc::now(),
        modified_at: Utc::now(),
    }
}

pub fn tx_note(category: &Category, amount: &str, date: NaiveDate, note: &str) -> Transaction {
    Transaction {
        note: Some(note.to_string()),
        ..tx(category, amount, date)
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the encrypted store.
//!
//! Each repository is a short-lived view bound to one [`Session`]: it
//! serializes its entity to JSON, seals it through [`EncryptedStore`], and
//! re-checks ownership on everything it decodes.
//!
//! [`Session`]: crate::auth::Session
//! [`EncryptedStore`]: super::EncryptedStore

pub mod budgets;
pub mod categories;
pub mod profiles;
pub mod transactions;

pub use budgets::BudgetRepository;
pub use categories::{CategoryDeletion, CategoryRepository, DEFAULT_EXPENSE_CATEGORIES};
pub use profiles::ProfileRepository;
pub use transactions::{TransactionQuery, TransactionRepository};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::VaultResult;

pub(crate) fn encode<T: Serialize>(value: &T) -> VaultResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> VaultResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Record key layout.
pub(crate) mod keys {
    use uuid::Uuid;

    use crate::models::Period;

    pub const CATEGORY_PREFIX: &str = "category/";
    pub const TRANSACTION_PREFIX: &str = "tx/";
    pub const BUDGET_PREFIX: &str = "budget/";

    pub fn category(id: Uuid) -> String {
        format!("{CATEGORY_PREFIX}{id}")
    }

    pub fn transaction(id: Uuid) -> String {
        format!("{TRANSACTION_PREFIX}{id}")
    }

    pub fn budget(category_id: Uuid, period: Period) -> String {
        format!("{BUDGET_PREFIX}{category_id}/{period}")
    }

    pub fn budgets_of(category_id: Uuid) -> String {
        format!("{BUDGET_PREFIX}{category_id}/")
    }

    pub fn profile(user_id: &str) -> String {
        format!("profile/{user_id}")
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Budget repository.
//!
//! The record key is derived from (category, period), so writing a budget
//! replaces any earlier one for the same pair: at most one active budget per
//! (user, category, period) by construction.

use tracing::debug;
use uuid::Uuid;

use super::{decode, encode, keys};
use crate::auth::Session;
use crate::error::{VaultError, VaultResult};
use crate::models::{Budget, Period};
use crate::storage::{EncryptedStore, OwnershipCheck, OwnershipEnforcer, WriteBatch};

/// Repository for budget records, scoped to one session.
pub struct BudgetRepository<'a> {
    store: &'a EncryptedStore,
    session: &'a Session,
}

impl<'a> BudgetRepository<'a> {
    pub fn new(store: &'a EncryptedStore, session: &'a Session) -> Self {
        Self { store, session }
    }

    pub fn user_id(&self) -> &str {
        self.session.user_id()
    }

    /// Insert or replace the budget for its (category, period).
    pub fn put(&self, budget: &Budget) -> VaultResult<()> {
        budget.verify_ownership(self.session.identity())?;
        self.store.put(
            self.session,
            &keys::budget(budget.category_id, budget.period),
            &encode(budget)?,
        )?;
        debug!(category_id = %budget.category_id, period = %budget.period, "Budget stored");
        Ok(())
    }

    /// Insert or replace several budgets in one atomic write.
    pub fn put_all(&self, budgets: &[Budget]) -> VaultResult<()> {
        let mut batch = WriteBatch::new();
        for budget in budgets {
            budget.verify_ownership(self.session.identity())?;
            batch.put(keys::budget(budget.category_id, budget.period), encode(budget)?);
        }
        self.store.apply(self.session, batch)
    }

    pub fn get(&self, category_id: Uuid, period: Period) -> VaultResult<Option<Budget>> {
        match self
            .store
            .get(self.session, &keys::budget(category_id, period))
            .and_then(|bytes| decode::<Budget>(&bytes))
            .verify_owner(self.session.identity())
        {
            Ok(budget) => Ok(Some(budget)),
            Err(VaultError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Every budget of the session user, by period then category.
    pub fn list(&self) -> VaultResult<Vec<Budget>> {
        let mut budgets = self
            .store
            .scan(self.session, keys::BUDGET_PREFIX)?
            .map(|item| item.and_then(|(_, bytes)| decode::<Budget>(&bytes)))
            .collect::<VaultResult<Vec<_>>>()?;
        budgets.sort_by(|a, b| (a.period, a.category_id).cmp(&(b.period, b.category_id)));
        Ok(budgets)
    }

    pub fn list_for_period(&self, period: Period) -> VaultResult<Vec<Budget>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|b| b.period == period)
            .collect())
    }

    pub fn remove(&self, category_id: Uuid, period: Period) -> VaultResult<()> {
        self.store
            .delete(self.session, &keys::budget(category_id, period))
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Point-in-time copy of one user's data for insight computations.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use crate::error::VaultResult;
use crate::models::{Budget, Category, Period, Transaction, TransactionFilter};
use crate::storage::{BudgetRepository, CategoryRepository, TransactionRepository};

/// Transactions (dated up to `as_of`), categories and budgets captured at
/// one instant. Writes made after capture are not visible.
#[derive(Debug, Clone)]
pub struct InsightSnapshot {
    as_of: NaiveDate,
    transactions: Vec<Transaction>,
    categories: Vec<Category>,
    budgets: Vec<Budget>,
}

impl InsightSnapshot {
    pub fn capture(
        transactions: &TransactionRepository<'_>,
        categories: &CategoryRepository<'_>,
        budgets: &BudgetRepository<'_>,
        as_of: NaiveDate,
    ) -> VaultResult<Self> {
        let snapshot = Self::from_parts(
            as_of,
            transactions.list(TransactionFilter::all())?,
            categories.list()?,
            budgets.list()?,
        );
        debug!(
            as_of = %as_of,
            transactions = snapshot.transactions.len(),
            "Insight snapshot captured"
        );
        Ok(snapshot)
    }

    pub fn from_parts(
        as_of: NaiveDate,
        mut transactions: Vec<Transaction>,
        categories: Vec<Category>,
        budgets: Vec<Budget>,
    ) -> Self {
        transactions.retain(|tx| tx.date <= as_of);
        transactions.sort_by(|a, b| (a.date, a.created_at, a.id).cmp(&(b.date, b.created_at, b.id)));
        Self {
            as_of,
            transactions,
            categories,
            budgets,
        }
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    /// The month containing `as_of`.
    pub fn current_period(&self) -> Period {
        Period::of(self.as_of)
    }

    /// The `months` complete months before the current one, oldest first.
    pub fn history_window(&self, months: u32) -> Vec<Period> {
        self.current_period().preceding(months)
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn budgets(&self) -> &[Budget] {
        &self.budgets
    }

    pub fn category(&self, id: Uuid) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn category_name(&self, id: Uuid) -> String {
        self.category(id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn expenses(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|tx| tx.is_expense())
    }

    pub fn expenses_in(&self, period: Period) -> impl Iterator<Item = &Transaction> {
        self.expenses().filter(move |tx| period.contains(tx.date))
    }

    /// Expense magnitude of a category in a period.
    pub fn spent(&self, category_id: Uuid, period: Period) -> Decimal {
        self.expenses_in(period)
            .filter(|tx| tx.category_id == category_id)
            .fold(Decimal::ZERO, |acc, tx| acc - tx.amount)
    }

    /// Monthly expense magnitudes of a category, one per period.
    pub fn monthly_spend(&self, category_id: Uuid, periods: &[Period]) -> Vec<Decimal> {
        periods.iter().map(|p| self.spent(category_id, *p)).collect()
    }

    pub fn income(&self, period: Period) -> Decimal {
        self.transactions
            .iter()
            .filter(|tx| !tx.is_expense() && period.contains(tx.date))
            .map(|tx| tx.amount)
            .sum()
    }

    pub fn budgets_for(&self, period: Period) -> impl Iterator<Item = &Budget> {
        self.budgets.iter().filter(move |b| b.period == period)
    }

    pub fn budget(&self, category_id: Uuid, period: Period) -> Option<&Budget> {
        self.budgets
            .iter()
            .find(|b| b.category_id == category_id && b.period == period)
    }
}

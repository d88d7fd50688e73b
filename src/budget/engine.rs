// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Budget engine: budget definitions, utilization, alerts and generation.

use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use super::alerts::{rank, Alert, Utilization};
use super::strategy::{allocate_surplus, generate, BudgetPlan, Pressure, Recommendation};
use crate::error::{VaultError, VaultResult};
use crate::models::{AmountSign, Budget, BudgetStrategy, CategoryKind, Period, TransactionFilter};
use crate::storage::{BudgetRepository, CategoryRepository, TransactionRepository};

/// Budget operations for one session.
///
/// Spend figures come from [`TransactionRepository::spent`], whose cache is
/// invalidated by every write touching the category and period.
pub struct BudgetEngine<'a> {
    transactions: TransactionRepository<'a>,
    categories: CategoryRepository<'a>,
    budgets: BudgetRepository<'a>,
    history_months: u32,
}

impl<'a> BudgetEngine<'a> {
    pub fn new(
        transactions: TransactionRepository<'a>,
        categories: CategoryRepository<'a>,
        budgets: BudgetRepository<'a>,
        history_months: u32,
    ) -> Self {
        Self {
            transactions,
            categories,
            budgets,
            history_months,
        }
    }

    // ========== Definitions ==========

    /// Set the limit for a category and period, replacing any earlier budget
    /// for the same pair.
    pub fn set_budget(
        &self,
        category_id: Uuid,
        period: Period,
        limit: Decimal,
        strategy: BudgetStrategy,
    ) -> VaultResult<Budget> {
        if limit <= Decimal::ZERO {
            return Err(VaultError::validation("budget limit must be positive"));
        }
        let category = match self.categories.get(category_id) {
            Ok(category) => category,
            Err(VaultError::NotFound(_)) => {
                return Err(VaultError::validation(format!(
                    "unknown category {category_id}"
                )))
            }
            Err(e) => return Err(e),
        };
        if category.kind != CategoryKind::Expense {
            return Err(VaultError::validation(format!(
                "'{}' is an income category and cannot be budgeted",
                category.name
            )));
        }

        let budget = Budget {
            owner_user_id: category.owner_user_id,
            category_id,
            period,
            limit,
            strategy,
            updated_at: Utc::now(),
        };
        self.budgets.put(&budget)?;
        Ok(budget)
    }

    pub fn budget(&self, category_id: Uuid, period: Period) -> VaultResult<Option<Budget>> {
        self.budgets.get(category_id, period)
    }

    pub fn budgets_for(&self, period: Period) -> VaultResult<Vec<Budget>> {
        self.budgets.list_for_period(period)
    }

    pub fn remove_budget(&self, category_id: Uuid, period: Period) -> VaultResult<()> {
        self.budgets.remove(category_id, period)
    }

    // ========== Utilization ==========

    /// Spent-to-limit figures. `NotFound` when the category has no budget
    /// for the period.
    pub fn utilization(&self, category_id: Uuid, period: Period) -> VaultResult<Utilization> {
        let budget = self.budget(category_id, period)?.ok_or_else(|| {
            VaultError::not_found(format!("budget for {category_id} in {period}"))
        })?;
        let spent = self.transactions.spent(category_id, period)?;
        Ok(Utilization::new(category_id, period, spent, budget.limit))
    }

    /// One alert per budgeted category at or above the warning threshold,
    /// critical first.
    pub fn alerts(&self, period: Period) -> VaultResult<Vec<Alert>> {
        let mut alerts = Vec::new();
        for budget in self.budgets_for(period)? {
            let spent = self.transactions.spent(budget.category_id, period)?;
            let utilization = Utilization::new(budget.category_id, period, spent, budget.limit);
            let category = self.categories.get(budget.category_id)?;
            if let Some(alert) = Alert::evaluate(&utilization, &category.name) {
                alerts.push(alert);
            }
        }
        rank(&mut alerts);
        debug!(period = %period, count = alerts.len(), "Budget alerts computed");
        Ok(alerts)
    }

    // ========== Generation ==========

    /// Expense totals per category over the history window before `period`.
    pub fn historical_spend(&self, period: Period) -> VaultResult<BTreeMap<Uuid, Decimal>> {
        let months = period.preceding(self.history_months);
        let (Some(first), Some(last)) = (months.first(), months.last()) else {
            return Ok(BTreeMap::new());
        };
        let filter = TransactionFilter::all()
            .between(first.first_day(), last.last_day())
            .sign(AmountSign::Expense);

        let mut totals = BTreeMap::new();
        for tx in self.transactions.query(filter)? {
            let tx = tx?;
            *totals.entry(tx.category_id).or_insert(Decimal::ZERO) -= tx.amount;
        }
        Ok(totals)
    }

    /// Limits per expense category for `income`, without saving them.
    pub fn generate(
        &self,
        plan: &BudgetPlan,
        income: Decimal,
        period: Period,
    ) -> VaultResult<BTreeMap<Uuid, Decimal>> {
        let categories = self.categories.list()?;
        let history = self.historical_spend(period)?;
        generate(plan, income, &categories, &history)
    }

    /// Generate limits and save them as the period's budgets. Categories
    /// that would get a zero limit are left unbudgeted.
    pub fn apply_plan(
        &self,
        plan: &BudgetPlan,
        income: Decimal,
        period: Period,
    ) -> VaultResult<Vec<Budget>> {
        let owner = self.budgets.user_id().to_string();
        let now = Utc::now();
        let budgets: Vec<Budget> = self
            .generate(plan, income, period)?
            .into_iter()
            .filter(|(_, limit)| *limit > Decimal::ZERO)
            .map(|(category_id, limit)| Budget {
                owner_user_id: owner.clone(),
                category_id,
                period,
                limit,
                strategy: plan.strategy(),
                updated_at: now,
            })
            .collect();
        self.budgets.put_all(&budgets)?;
        info!(
            period = %period,
            strategy = %plan.strategy(),
            count = budgets.len(),
            "Budget plan applied"
        );
        Ok(budgets)
    }

    /// Proposals for income not covered by the period's budgets.
    ///
    /// Empty when budgets already use all income for the period.
    pub fn optimize_surplus(&self, period: Period) -> VaultResult<Vec<Recommendation>> {
        let income = self.transactions.income(period)?;
        let budgets = self.budgets_for(period)?;
        let budgeted: Decimal = budgets.iter().map(|b| b.limit).sum();
        let surplus = income - budgeted;
        if surplus <= Decimal::ZERO {
            return Ok(Vec::new());
        }

        let history = self.historical_spend(period)?;
        let months = self
            .transactions
            .months_of_history(period.prev())?
            .clamp(1, self.history_months.max(1));

        let mut pressures = Vec::with_capacity(budgets.len());
        for budget in &budgets {
            let category = self.categories.get(budget.category_id)?;
            let total = history
                .get(&budget.category_id)
                .copied()
                .unwrap_or(Decimal::ZERO);
            pressures.push(Pressure {
                category_id: budget.category_id,
                name: category.name,
                average_spend: total / Decimal::from(months),
                limit: budget.limit,
            });
        }
        Ok(allocate_surplus(surplus, &pressures))
    }
}

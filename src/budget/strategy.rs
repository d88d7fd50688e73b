// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Budget generation strategies and the surplus heuristic.
//!
//! Both are pure functions of their inputs so that the same snapshot of
//! income, categories and history always yields the same numbers.
//!
//! ## Bucket plans
//!
//! | Plan          | Needs | Wants | Savings |
//! |---------------|-------|-------|---------|
//! | 50/30/20      | 50 %  | 30 %  | 20 %    |
//! | Conservative  | 50 %  | 20 %  | 30 %    |
//!
//! Within a bucket, the bucket amount is split across its expense
//! categories in proportion to their historical spend, or equally when
//! none of them has history. Limits are whole cents and add up to exactly
//! the bucket's share (itself rounded down to cents).

use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{VaultError, VaultResult};
use crate::models::{BudgetBucket, BudgetStrategy, Category, CategoryKind};

/// How to derive limits from income.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BudgetPlan {
    FiftyThirtyTwenty,
    Conservative,
    /// Share of income per category; shares must add up to at most 1.
    Custom(BTreeMap<Uuid, Decimal>),
}

impl BudgetPlan {
    /// Strategy tag stored on generated budgets.
    pub fn strategy(&self) -> BudgetStrategy {
        match self {
            BudgetPlan::FiftyThirtyTwenty => BudgetStrategy::FiftyThirtyTwenty,
            BudgetPlan::Conservative => BudgetStrategy::Conservative,
            BudgetPlan::Custom(_) => BudgetStrategy::Custom,
        }
    }

    /// Share of income per bucket, for the bucket plans.
    pub fn bucket_shares(&self) -> Option<[(BudgetBucket, Decimal); 3]> {
        let (needs, wants, savings) = match self {
            BudgetPlan::FiftyThirtyTwenty => (50, 30, 20),
            BudgetPlan::Conservative => (50, 20, 30),
            BudgetPlan::Custom(_) => return None,
        };
        Some([
            (BudgetBucket::Needs, Decimal::new(needs, 2)),
            (BudgetBucket::Wants, Decimal::new(wants, 2)),
            (BudgetBucket::Savings, Decimal::new(savings, 2)),
        ])
    }
}

pub(crate) fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

/// `amount * numerator / denominator`, or `Validation` when out of range.
fn portion(amount: Decimal, numerator: Decimal, denominator: Decimal) -> VaultResult<Decimal> {
    amount
        .checked_mul(numerator)
        .and_then(|v| v.checked_div(denominator))
        .ok_or_else(|| VaultError::validation(format!("income {amount} is too large to allocate")))
}

/// Generate a limit per expense category.
///
/// `history` maps category ids to their spend over the history window.
/// Income categories in `categories` are ignored.
pub fn generate(
    plan: &BudgetPlan,
    income: Decimal,
    categories: &[Category],
    history: &BTreeMap<Uuid, Decimal>,
) -> VaultResult<BTreeMap<Uuid, Decimal>> {
    if income < Decimal::ZERO {
        return Err(VaultError::validation("income must not be negative"));
    }
    let expense: Vec<&Category> = categories
        .iter()
        .filter(|c| c.kind == CategoryKind::Expense)
        .collect();

    let mut limits = BTreeMap::new();
    match plan {
        BudgetPlan::Custom(shares) => {
            let mut total = Decimal::ZERO;
            for (category_id, share) in shares {
                if *share < Decimal::ZERO {
                    return Err(VaultError::validation("custom shares must not be negative"));
                }
                if !expense.iter().any(|c| c.id == *category_id) {
                    return Err(VaultError::validation(format!(
                        "custom share for unknown expense category {category_id}"
                    )));
                }
                total += *share;
                limits.insert(*category_id, round_cents(portion(income, *share, Decimal::ONE)?));
            }
            if total > Decimal::ONE {
                return Err(VaultError::validation(format!(
                    "custom shares add up to {total}, more than 1"
                )));
            }
        }
        _ => {
            for (bucket, share) in plan.bucket_shares().into_iter().flatten() {
                let members: Vec<&Category> =
                    expense.iter().copied().filter(|c| c.bucket == bucket).collect();
                let amount = round_cents(portion(income, share, Decimal::ONE)?);
                distribute(&mut limits, amount, &members, history)?;
            }
        }
    }
    Ok(limits)
}

fn distribute(
    limits: &mut BTreeMap<Uuid, Decimal>,
    amount: Decimal,
    members: &[&Category],
    history: &BTreeMap<Uuid, Decimal>,
) -> VaultResult<()> {
    if members.is_empty() {
        return Ok(());
    }
    let weight = |c: &Category| {
        history
            .get(&c.id)
            .copied()
            .unwrap_or(Decimal::ZERO)
            .max(Decimal::ZERO)
    };
    let total = members
        .iter()
        .try_fold(Decimal::ZERO, |acc, c| acc.checked_add(weight(*c)))
        .ok_or_else(|| VaultError::validation("historical spend is too large to weigh"))?;

    // (id, rounded-down limit, dropped fraction)
    let mut shares: Vec<(Uuid, Decimal, Decimal)> = members
        .iter()
        .map(|c| -> VaultResult<(Uuid, Decimal, Decimal)> {
            let raw = if total > Decimal::ZERO {
                portion(amount, weight(*c), total)?
            } else {
                amount / Decimal::from(members.len())
            };
            let limit = round_cents(raw);
            Ok((c.id, limit, raw - limit))
        })
        .collect::<VaultResult<_>>()?;

    // Hand the cents lost to rounding back, largest fraction first.
    let cent = Decimal::new(1, 2);
    let mut leftover = amount - shares.iter().map(|s| s.1).sum::<Decimal>();
    let mut order: Vec<usize> = (0..shares.len()).collect();
    order.sort_by(|&a, &b| shares[b].2.cmp(&shares[a].2).then(shares[a].0.cmp(&shares[b].0)));
    for i in order {
        if leftover < cent {
            break;
        }
        shares[i].1 += cent;
        leftover -= cent;
    }

    for (id, limit, _) in shares {
        limits.insert(id, limit);
    }
    Ok(())
}

// =============================================================================
// Surplus
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AllocationTarget {
    Category { id: Uuid, name: String },
    Savings,
}

/// A proposed use of unbudgeted income.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub target: AllocationTarget,
    pub amount: Decimal,
    pub reason: String,
}

/// Budget pressure of one category: how far its average monthly spend
/// exceeds its current limit.
#[derive(Debug, Clone)]
pub struct Pressure {
    pub category_id: Uuid,
    pub name: String,
    pub average_spend: Decimal,
    pub limit: Decimal,
}

impl Pressure {
    pub fn excess(&self) -> Decimal {
        (self.average_spend - self.limit).max(Decimal::ZERO)
    }
}

/// Split `surplus` across pressured categories in proportion to their
/// excess, never more than the excess itself. What is left goes to savings.
///
/// Ordered by category name, savings last. Empty when there is no surplus.
pub fn allocate_surplus(surplus: Decimal, pressures: &[Pressure]) -> Vec<Recommendation> {
    if surplus <= Decimal::ZERO {
        return Vec::new();
    }
    let total_excess: Decimal = pressures.iter().map(Pressure::excess).sum();

    let mut out = Vec::new();
    let mut allocated = Decimal::ZERO;
    if total_excess > Decimal::ZERO {
        let mut pressured: Vec<&Pressure> =
            pressures.iter().filter(|p| p.excess() > Decimal::ZERO).collect();
        pressured.sort_by(|a, b| a.name.cmp(&b.name).then(a.category_id.cmp(&b.category_id)));

        for p in pressured {
            let amount = round_cents((surplus * p.excess() / total_excess).min(p.excess()));
            if amount <= Decimal::ZERO {
                continue;
            }
            allocated += amount;
            out.push(Recommendation {
                target: AllocationTarget::Category {
                    id: p.category_id,
                    name: p.name.clone(),
                },
                amount,
                reason: format!(
                    "{} averages {} a month against a limit of {}",
                    p.name,
                    p.average_spend.round_dp(2),
                    p.limit
                ),
            });
        }
    }

    let rest = surplus - allocated;
    if rest > Decimal::ZERO {
        out.push(Recommendation {
            target: AllocationTarget::Savings,
            amount: rest,
            reason: "unbudgeted income left after covering over-limit categories".to_string(),
        });
    }
    out
}

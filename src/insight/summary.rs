// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Descriptive summaries: month overview, category breakdown, trends, and
//! the monthly and yearly reports built from them.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::forecast::TrendDirection;
use super::model::to_f64;
use super::InsightSnapshot;
use crate::error::VaultResult;
use crate::models::{Period, Transaction};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryAmount {
    pub category_id: Uuid,
    pub category_name: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlySummary {
    pub period: Period,
    pub total_spent: Decimal,
    pub total_income: Decimal,
    /// Largest first.
    pub by_category: Vec<CategoryAmount>,
    /// Spend per day of month, days without spending omitted.
    pub daily: BTreeMap<u32, Decimal>,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryShare {
    pub category_id: Uuid,
    pub category_name: String,
    pub total: Decimal,
    pub count: usize,
    /// Share of all spending in the range, in percent.
    pub percentage: Decimal,
    pub average: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    pub category_id: Uuid,
    pub category_name: String,
    pub from: Period,
    pub to: Period,
    pub first_amount: Decimal,
    pub last_amount: Decimal,
    /// Relative change from the first to the last active month.
    pub change: f64,
    pub direction: TrendDirection,
}

fn sorted_amounts(snapshot: &InsightSnapshot, totals: BTreeMap<Uuid, Decimal>) -> Vec<CategoryAmount> {
    let mut out: Vec<CategoryAmount> = totals
        .into_iter()
        .map(|(category_id, amount)| CategoryAmount {
            category_id,
            category_name: snapshot.category_name(category_id),
            amount,
        })
        .collect();
    out.sort_by(|a, b| {
        b.amount
            .cmp(&a.amount)
            .then_with(|| a.category_name.cmp(&b.category_name))
    });
    out
}

pub fn monthly_summary(snapshot: &InsightSnapshot, period: Period) -> MonthlySummary {
    let mut by_category: BTreeMap<Uuid, Decimal> = BTreeMap::new();
    let mut daily: BTreeMap<u32, Decimal> = BTreeMap::new();
    let mut total_spent = Decimal::ZERO;
    let mut count = 0;

    for tx in snapshot.expenses_in(period) {
        let magnitude = tx.amount.abs();
        total_spent += magnitude;
        count += 1;
        *by_category.entry(tx.category_id).or_insert(Decimal::ZERO) += magnitude;
        *daily.entry(tx.date.day()).or_insert(Decimal::ZERO) += magnitude;
    }
    let income = snapshot.income(period);
    let income_count = snapshot
        .transactions()
        .iter()
        .filter(|tx| !tx.is_expense() && period.contains(tx.date))
        .count();

    MonthlySummary {
        period,
        total_spent,
        total_income: income,
        by_category: sorted_amounts(snapshot, by_category),
        daily,
        transaction_count: count + income_count,
    }
}

/// Spending per category between two dates (inclusive), largest first.
pub fn category_breakdown(snapshot: &InsightSnapshot, from: NaiveDate, to: NaiveDate) -> Vec<CategoryShare> {
    let mut stats: BTreeMap<Uuid, (Decimal, usize)> = BTreeMap::new();
    for tx in snapshot.expenses().filter(|tx| tx.date >= from && tx.date <= to) {
        let entry = stats.entry(tx.category_id).or_insert((Decimal::ZERO, 0));
        entry.0 += tx.amount.abs();
        entry.1 += 1;
    }
    let grand_total: Decimal = stats.values().map(|(total, _)| *total).sum();

    let mut shares: Vec<CategoryShare> = stats
        .into_iter()
        .map(|(category_id, (total, count))| CategoryShare {
            category_id,
            category_name: snapshot.category_name(category_id),
            total,
            count,
            percentage: if grand_total > Decimal::ZERO {
                (total * Decimal::ONE_HUNDRED / grand_total).round_dp(2)
            } else {
                Decimal::ZERO
            },
            average: (total / Decimal::from(count)).round_dp(2),
        })
        .collect();
    shares.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| a.category_name.cmp(&b.category_name))
    });
    shares
}

/// First versus last active month per category over the `months` complete
/// months before the snapshot date. Largest absolute change first.
pub fn trends(snapshot: &InsightSnapshot, months: u32) -> Vec<Trend> {
    let window = snapshot.history_window(months);
    let mut category_ids: Vec<Uuid> = snapshot.expenses().map(|tx| tx.category_id).collect();
    category_ids.sort();
    category_ids.dedup();

    let mut out = Vec::new();
    for category_id in category_ids {
        let totals = snapshot.monthly_spend(category_id, &window);
        let active: Vec<(Period, Decimal)> = window
            .iter()
            .copied()
            .zip(totals)
            .filter(|(_, total)| !total.is_zero())
            .collect();
        let (Some(first), Some(last)) = (active.first(), active.last()) else {
            continue;
        };
        if first.0 == last.0 {
            continue;
        }
        let change = to_f64((last.1 - first.1) / first.1);
        out.push(Trend {
            category_id,
            category_name: snapshot.category_name(category_id),
            from: first.0,
            to: last.0,
            first_amount: first.1,
            last_amount: last.1,
            change,
            direction: TrendDirection::of_slope(to_f64(last.1 - first.1)),
        });
    }
    out.sort_by(|a, b| {
        b.change
            .abs()
            .total_cmp(&a.change.abs())
            .then_with(|| a.category_name.cmp(&b.category_name))
    });
    out
}

// ========== Reports ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    OnTrack,
    OverBudget,
    NoBudget,
}

/// Budgeted against actual spending for one category over a report's months.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BudgetLine {
    pub category_id: Uuid,
    pub category_name: String,
    /// Sum of the category's budgets over the report's months.
    pub limit: Option<Decimal>,
    pub spent: Decimal,
    pub remaining: Option<Decimal>,
    /// Percent of the limit spent, to one decimal place.
    pub utilization: Option<Decimal>,
    pub status: BudgetStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopExpense {
    pub rank: usize,
    pub transaction_id: Uuid,
    pub date: NaiveDate,
    pub category_id: Uuid,
    pub category_name: String,
    pub amount: Decimal,
    pub note: Option<String>,
}

/// Spending against the preceding period of the same length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodChange {
    pub previous: Decimal,
    pub current: Decimal,
    pub change: Decimal,
    /// `None` when nothing was spent in the previous period.
    pub change_percent: Option<Decimal>,
    pub direction: TrendDirection,
}

impl PeriodChange {
    fn between(previous: Decimal, current: Decimal) -> Self {
        let change = current - previous;
        let change_percent = (previous > Decimal::ZERO)
            .then(|| (change * Decimal::ONE_HUNDRED / previous).round_dp(1));
        Self {
            previous,
            current,
            change,
            change_percent,
            direction: TrendDirection::of_slope(to_f64(change)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyReport {
    pub summary: MonthlySummary,
    /// Income minus spending.
    pub net: Decimal,
    pub budget: Vec<BudgetLine>,
    pub top_expenses: Vec<TopExpense>,
    pub versus_previous: PeriodChange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthTotal {
    pub period: Period,
    pub spent: Decimal,
    pub income: Decimal,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearlyReport {
    pub year: i32,
    /// January to December.
    pub months: Vec<MonthTotal>,
    pub total_spent: Decimal,
    pub total_income: Decimal,
    pub net: Decimal,
    /// Total spending over twelve months.
    pub average_monthly: Decimal,
    pub by_category: Vec<CategoryShare>,
    pub budget: Vec<BudgetLine>,
    pub top_expenses: Vec<TopExpense>,
    /// Among months with spending; `None` for a year without any.
    pub highest_month: Option<Period>,
    pub lowest_month: Option<Period>,
    /// First against last month with spending.
    pub direction: TrendDirection,
    pub versus_previous: PeriodChange,
}

fn spent_between(snapshot: &InsightSnapshot, from: NaiveDate, to: NaiveDate) -> Decimal {
    snapshot
        .expenses()
        .filter(|tx| tx.date >= from && tx.date <= to)
        .map(|tx| tx.amount.abs())
        .sum()
}

/// One line per category that is budgeted or has spending in `periods`,
/// by name.
fn budget_lines(snapshot: &InsightSnapshot, periods: &[Period]) -> Vec<BudgetLine> {
    let mut limits: BTreeMap<Uuid, Decimal> = BTreeMap::new();
    for budget in snapshot.budgets().iter().filter(|b| periods.contains(&b.period)) {
        *limits.entry(budget.category_id).or_insert(Decimal::ZERO) += budget.limit;
    }
    let mut spent: BTreeMap<Uuid, Decimal> = BTreeMap::new();
    for tx in snapshot.expenses().filter(|tx| periods.contains(&Period::of(tx.date))) {
        *spent.entry(tx.category_id).or_insert(Decimal::ZERO) += tx.amount.abs();
    }

    let ids: BTreeSet<Uuid> = limits.keys().chain(spent.keys()).copied().collect();
    let mut lines: Vec<BudgetLine> = ids
        .into_iter()
        .map(|category_id| {
            let spent = spent.get(&category_id).copied().unwrap_or(Decimal::ZERO);
            let limit = limits.get(&category_id).copied();
            let status = match limit {
                None => BudgetStatus::NoBudget,
                Some(limit) if spent > limit => BudgetStatus::OverBudget,
                Some(_) => BudgetStatus::OnTrack,
            };
            BudgetLine {
                category_id,
                category_name: snapshot.category_name(category_id),
                limit,
                spent,
                remaining: limit.map(|limit| limit - spent),
                utilization: limit
                    .and_then(|limit| (spent * Decimal::ONE_HUNDRED).checked_div(limit))
                    .map(|percent| percent.round_dp(1)),
                status,
            }
        })
        .collect();
    lines.sort_by(|a, b| {
        a.category_name
            .cmp(&b.category_name)
            .then_with(|| a.category_id.cmp(&b.category_id))
    });
    lines
}

/// The `limit` largest expenses between two dates, earliest first on ties.
fn top_expenses(
    snapshot: &InsightSnapshot,
    from: NaiveDate,
    to: NaiveDate,
    limit: usize,
) -> Vec<TopExpense> {
    let mut expenses: Vec<&Transaction> = snapshot
        .expenses()
        .filter(|tx| tx.date >= from && tx.date <= to)
        .collect();
    expenses.sort_by(|a, b| {
        b.amount
            .abs()
            .cmp(&a.amount.abs())
            .then_with(|| a.date.cmp(&b.date))
            .then_with(|| a.id.cmp(&b.id))
    });
    expenses
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, tx)| TopExpense {
            rank: i + 1,
            transaction_id: tx.id,
            date: tx.date,
            category_id: tx.category_id,
            category_name: snapshot.category_name(tx.category_id),
            amount: tx.amount.abs(),
            note: tx.note.clone(),
        })
        .collect()
}

pub fn monthly_report(snapshot: &InsightSnapshot, period: Period, top_n: usize) -> MonthlyReport {
    let summary = monthly_summary(snapshot, period);
    let previous = period.prev();
    let previous_spent = spent_between(snapshot, previous.first_day(), previous.last_day());
    MonthlyReport {
        net: summary.total_income - summary.total_spent,
        budget: budget_lines(snapshot, &[period]),
        top_expenses: top_expenses(snapshot, period.first_day(), period.last_day(), top_n),
        versus_previous: PeriodChange::between(previous_spent, summary.total_spent),
        summary,
    }
}

pub fn yearly_report(snapshot: &InsightSnapshot, year: i32, top_n: usize) -> VaultResult<YearlyReport> {
    let january = Period::new(year, 1)?;
    let mut periods = Vec::with_capacity(12);
    let mut period = january;
    for _ in 0..12 {
        periods.push(period);
        period = period.next();
    }
    let december = period.prev();
    let (from, to) = (january.first_day(), december.last_day());

    let months: Vec<MonthTotal> = periods
        .iter()
        .map(|&period| {
            let summary = monthly_summary(snapshot, period);
            MonthTotal {
                period,
                spent: summary.total_spent,
                income: summary.total_income,
                transaction_count: summary.transaction_count,
            }
        })
        .collect();
    let total_spent: Decimal = months.iter().map(|m| m.spent).sum();
    let total_income: Decimal = months.iter().map(|m| m.income).sum();

    let active: Vec<&MonthTotal> = months.iter().filter(|m| !m.spent.is_zero()).collect();
    let highest_month = active
        .iter()
        .max_by(|a, b| a.spent.cmp(&b.spent).then_with(|| b.period.cmp(&a.period)))
        .map(|m| m.period);
    let lowest_month = active
        .iter()
        .min_by(|a, b| a.spent.cmp(&b.spent).then_with(|| a.period.cmp(&b.period)))
        .map(|m| m.period);
    let direction = match (active.first(), active.last()) {
        (Some(first), Some(last)) => TrendDirection::of_slope(to_f64(last.spent - first.spent)),
        _ => TrendDirection::Stable,
    };

    let previous_spent: Decimal = january
        .preceding(12)
        .iter()
        .map(|p| spent_between(snapshot, p.first_day(), p.last_day()))
        .sum();

    Ok(YearlyReport {
        year,
        total_spent,
        total_income,
        net: total_income - total_spent,
        average_monthly: (total_spent / Decimal::from(12)).round_dp(2),
        by_category: category_breakdown(snapshot, from, to),
        budget: budget_lines(snapshot, &periods),
        top_expenses: top_expenses(snapshot, from, to, top_n),
        highest_month,
        lowest_month,
        direction,
        versus_previous: PeriodChange::between(previous_spent, total_spent),
        months,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Budget, BudgetStrategy, Category, CategoryKind};
    use crate::test_support::{category, date, dec, tx, tx_note, TEST_OWNER};

    fn budget(category: &Category, period: Period, limit: &str) -> Budget {
        Budget {
            owner_user_id: TEST_OWNER.to_string(),
            category_id: category.id,
            period,
            limit: dec(limit),
            strategy: BudgetStrategy::Manual,
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn month_overview() {
        let food = category("Food", CategoryKind::Expense);
        let rent = category("Housing", CategoryKind::Expense);
        let salary = category("Salary", CategoryKind::Income);
        let snapshot = InsightSnapshot::from_parts(
            date(2024, 6, 30),
            vec![
                tx(&food, "-20", date(2024, 6, 3)),
                tx(&food, "-5.50", date(2024, 6, 3)),
                tx(&rent, "-700", date(2024, 6, 1)),
                tx(&salary, "2500", date(2024, 6, 1)),
                tx(&food, "-99", date(2024, 5, 31)),
            ],
            vec![food.clone(), rent.clone(), salary],
            vec![],
        );

        let summary = monthly_summary(&snapshot, Period::new(2024, 6).unwrap());
        assert_eq!(summary.total_spent, dec("725.50"));
        assert_eq!(summary.total_income, dec("2500"));
        assert_eq!(summary.transaction_count, 4);
        assert_eq!(summary.by_category[0].category_id, rent.id);
        assert_eq!(summary.by_category[1].amount, dec("25.50"));
        assert_eq!(summary.daily[&3], dec("25.50"));
        assert!(!summary.daily.contains_key(&2));
    }

    #[test]
    fn breakdown_percentages() {
        let food = category("Food", CategoryKind::Expense);
        let fun = category("Fun", CategoryKind::Expense);
        let snapshot = InsightSnapshot::from_parts(
            date(2024, 6, 30),
            vec![
                tx(&food, "-30", date(2024, 6, 3)),
                tx(&food, "-30", date(2024, 6, 4)),
                tx(&fun, "-40", date(2024, 6, 5)),
                tx(&fun, "-1000", date(2024, 4, 5)),
            ],
            vec![food.clone(), fun.clone()],
            vec![],
        );
        let shares = category_breakdown(&snapshot, date(2024, 6, 1), date(2024, 6, 30));
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].category_id, food.id);
        assert_eq!(shares[0].percentage, dec("60"));
        assert_eq!(shares[0].average, dec("30"));
        assert_eq!(shares[1].percentage, dec("40"));
    }

    #[test]
    fn trend_compares_first_and_last_active_month() {
        let food = category("Food", CategoryKind::Expense);
        let fun = category("Fun", CategoryKind::Expense);
        let snapshot = InsightSnapshot::from_parts(
            date(2024, 7, 2),
            vec![
                tx(&food, "-100", date(2024, 4, 3)),
                tx(&food, "-150", date(2024, 6, 3)),
                tx(&fun, "-80", date(2024, 5, 3)),
                tx(&fun, "-60", date(2024, 6, 3)),
                // Current month is excluded.
                tx(&fun, "-900", date(2024, 7, 1)),
            ],
            vec![food.clone(), fun.clone()],
            vec![],
        );
        let trends = trends(&snapshot, 3);
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].category_id, food.id);
        assert!((trends[0].change - 0.5).abs() < 1e-9);
        assert_eq!(trends[0].direction, TrendDirection::Increasing);
        assert_eq!(trends[1].direction, TrendDirection::Decreasing);
        assert!((trends[1].change + 0.25).abs() < 1e-9);
    }

    #[test]
    fn monthly_report_against_budget_and_previous_month() {
        let food = category("Food", CategoryKind::Expense);
        let fun = category("Fun", CategoryKind::Expense);
        let rent = category("Housing", CategoryKind::Expense);
        let salary = category("Salary", CategoryKind::Income);
        let june = Period::new(2024, 6).unwrap();
        let snapshot = InsightSnapshot::from_parts(
            date(2024, 6, 30),
            vec![
                tx(&food, "-60", date(2024, 6, 2)),
                tx_note(&food, "-70", date(2024, 6, 10), "market"),
                tx(&fun, "-20", date(2024, 6, 5)),
                tx(&rent, "-700", date(2024, 6, 1)),
                tx(&salary, "2500", date(2024, 6, 1)),
                tx(&food, "-400", date(2024, 5, 3)),
            ],
            vec![food.clone(), fun.clone(), rent.clone(), salary],
            vec![budget(&food, june, "100"), budget(&fun, june, "50")],
        );

        let report = monthly_report(&snapshot, june, 2);
        assert_eq!(report.summary.total_spent, dec("850"));
        assert_eq!(report.net, dec("1650"));

        let statuses: Vec<(&str, BudgetStatus)> = report
            .budget
            .iter()
            .map(|line| (line.category_name.as_str(), line.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("Food", BudgetStatus::OverBudget),
                ("Fun", BudgetStatus::OnTrack),
                ("Housing", BudgetStatus::NoBudget),
            ]
        );
        assert_eq!(report.budget[0].remaining, Some(dec("-30")));
        assert_eq!(report.budget[0].utilization, Some(dec("130")));
        assert_eq!(report.budget[1].utilization, Some(dec("40")));
        assert_eq!(report.budget[2].limit, None);

        assert_eq!(report.top_expenses.len(), 2);
        assert_eq!(report.top_expenses[0].category_id, rent.id);
        assert_eq!(report.top_expenses[1].amount, dec("70"));
        assert_eq!(report.top_expenses[1].note.as_deref(), Some("market"));
        assert_eq!(report.top_expenses[1].rank, 2);

        assert_eq!(report.versus_previous.previous, dec("400"));
        assert_eq!(report.versus_previous.change, dec("450"));
        assert_eq!(report.versus_previous.change_percent, Some(dec("112.5")));
        assert_eq!(report.versus_previous.direction, TrendDirection::Increasing);
    }

    #[test]
    fn first_month_has_no_change_percent() {
        let food = category("Food", CategoryKind::Expense);
        let snapshot = InsightSnapshot::from_parts(
            date(2024, 6, 30),
            vec![tx(&food, "-10", date(2024, 6, 2))],
            vec![food.clone()],
            vec![],
        );
        let report = monthly_report(&snapshot, Period::new(2024, 6).unwrap(), 5);
        assert_eq!(report.versus_previous.change_percent, None);
        assert_eq!(report.top_expenses.len(), 1);
    }

    #[test]
    fn yearly_report_totals_and_extremes() {
        let food = category("Food", CategoryKind::Expense);
        let fun = category("Fun", CategoryKind::Expense);
        let snapshot = InsightSnapshot::from_parts(
            date(2025, 1, 15),
            vec![
                tx(&food, "-100", date(2024, 1, 10)),
                tx(&food, "-300", date(2024, 3, 10)),
                tx(&fun, "-50", date(2024, 12, 24)),
                tx(&food, "-200", date(2023, 6, 10)),
            ],
            vec![food.clone(), fun.clone()],
            vec![
                budget(&food, Period::new(2024, 1).unwrap(), "150"),
                budget(&food, Period::new(2024, 3).unwrap(), "150"),
            ],
        );

        let report = yearly_report(&snapshot, 2024, 1).unwrap();
        assert_eq!(report.months.len(), 12);
        assert_eq!(report.months[1].spent, Decimal::ZERO);
        assert_eq!(report.total_spent, dec("450"));
        assert_eq!(report.average_monthly, dec("37.5"));
        assert_eq!(report.highest_month, Some(Period::new(2024, 3).unwrap()));
        assert_eq!(report.lowest_month, Some(Period::new(2024, 12).unwrap()));
        assert_eq!(report.direction, TrendDirection::Decreasing);
        assert_eq!(report.by_category[0].category_id, food.id);
        assert_eq!(report.by_category[0].percentage, dec("88.89"));

        assert_eq!(report.budget[0].limit, Some(dec("300")));
        assert_eq!(report.budget[0].status, BudgetStatus::OverBudget);
        assert_eq!(report.budget[1].status, BudgetStatus::NoBudget);

        assert_eq!(report.top_expenses.len(), 1);
        assert_eq!(report.top_expenses[0].amount, dec("300"));
        assert_eq!(report.versus_previous.previous, dec("200"));
        assert_eq!(report.versus_previous.change_percent, Some(dec("125")));

        assert!(matches!(
            yearly_report(&snapshot, 1_000_000, 1),
            Err(crate::error::VaultError::Validation(_))
        ));
    }
}

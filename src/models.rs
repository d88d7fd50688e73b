// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Domain models.
//!
//! Amounts are `rust_decimal::Decimal` in the user's base currency, negative
//! for expenses. Nothing here converts between currencies.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{VaultError, VaultResult};
use crate::storage::OwnedResource;

// =============================================================================
// Period
// =============================================================================

/// A calendar month, the granularity of budgets. Displays as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> VaultResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(VaultError::validation(format!(
                "month must be 1-12, got {month}"
            )));
        }
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(VaultError::validation(format!("year {year} out of range")));
        }
        Ok(Self { year, month })
    }

    /// The month containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next()
            .first_day()
            .checked_sub_days(Days::new(1))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn days(&self) -> u32 {
        self.last_day().day()
    }

    /// Day `day` of the month, clamped to the month's length.
    pub fn day(&self, day: u32) -> NaiveDate {
        let day = day.clamp(1, self.days());
        self.first_day().with_day(day).unwrap_or(self.first_day())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// The `n` months before this one, oldest first.
    pub fn preceding(&self, n: u32) -> Vec<Period> {
        let mut out = Vec::with_capacity(n as usize);
        let mut p = *self;
        for _ in 0..n {
            p = p.prev();
            out.push(p);
        }
        out.reverse();
        out
    }

    /// Whole months from `self` to `later` (negative if `later` is earlier).
    pub fn months_until(&self, later: Period) -> i32 {
        (later.year - self.year) * 12 + later.month as i32 - self.month as i32
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| VaultError::validation(format!("period '{s}' is not YYYY-MM")))?;
        let year = year
            .parse()
            .map_err(|_| VaultError::validation(format!("period '{s}' has a bad year")))?;
        let month = month
            .parse()
            .map_err(|_| VaultError::validation(format!("period '{s}' has a bad month")))?;
        Period::new(year, month)
    }
}

// =============================================================================
// Categories
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Income,
    Expense,
}

impl CategoryKind {
    /// Whether a signed amount belongs under this kind.
    pub fn accepts(&self, amount: Decimal) -> bool {
        match self {
            CategoryKind::Income => amount.is_sign_positive(),
            CategoryKind::Expense => amount.is_sign_negative(),
        }
    }
}

/// 50/30/20 bucket of an expense category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetBucket {
    Needs,
    Wants,
    Savings,
}

impl BudgetBucket {
    /// Default bucket for a category name.
    pub fn infer(name: &str) -> Self {
        const NEEDS: [&str; 7] = [
            "housing",
            "food",
            "transport",
            "health",
            "utilities",
            "insurance",
            "education",
        ];
        let lower = name.trim().to_lowercase();
        if lower == "savings" {
            BudgetBucket::Savings
        } else if NEEDS.contains(&lower.as_str()) {
            BudgetBucket::Needs
        } else {
            BudgetBucket::Wants
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub owner_user_id: String,
    pub name: String,
    pub kind: CategoryKind,
    pub bucket: BudgetBucket,
    pub created_at: DateTime<Utc>,
}

impl OwnedResource for Category {
    fn owner_user_id(&self) -> &str {
        &self.owner_user_id
    }
}

/// Input for creating a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub name: String,
    pub kind: CategoryKind,
    /// Inferred from the name when `None`.
    pub bucket: Option<BudgetBucket>,
}

impl NewCategory {
    pub fn expense(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CategoryKind::Expense,
            bucket: None,
        }
    }

    pub fn income(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CategoryKind::Income,
            bucket: None,
        }
    }
}

// =============================================================================
// Transactions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Immutable once created.
    pub id: Uuid,
    pub owner_user_id: String,
    /// Negative for expenses.
    pub amount: Decimal,
    pub category_id: Uuid,
    pub date: NaiveDate,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_expense(&self) -> bool {
        self.amount.is_sign_negative()
    }

    pub fn period(&self) -> Period {
        Period::of(self.date)
    }
}

impl OwnedResource for Transaction {
    fn owner_user_id(&self) -> &str {
        &self.owner_user_id
    }
}

/// Input for adding a transaction; the repository assigns id, owner and
/// timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub amount: Decimal,
    pub category_id: Uuid,
    pub date: NaiveDate,
    #[serde(default)]
    pub note: Option<String>,
}

/// Partial update. `note: Some(None)` clears the note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionPatch {
    pub amount: Option<Decimal>,
    pub category_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub note: Option<Option<String>>,
}

impl TransactionPatch {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.category_id.is_none()
            && self.date.is_none()
            && self.note.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmountSign {
    #[default]
    Any,
    Expense,
    Income,
}

/// Query filter; every criterion is optional and they combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub categories: Option<BTreeSet<Uuid>>,
    pub sign: AmountSign,
}

impl TransactionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Inclusive date range.
    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn in_period(self, period: Period) -> Self {
        self.between(period.first_day(), period.last_day())
    }

    pub fn categories(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.categories = Some(ids.into_iter().collect());
        self
    }

    pub fn category(self, id: Uuid) -> Self {
        self.categories([id])
    }

    pub fn sign(mut self, sign: AmountSign) -> Self {
        self.sign = sign;
        self
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        if self.from.is_some_and(|from| tx.date < from) {
            return false;
        }
        if self.to.is_some_and(|to| tx.date > to) {
            return false;
        }
        if let Some(categories) = &self.categories {
            if !categories.contains(&tx.category_id) {
                return false;
            }
        }
        match self.sign {
            AmountSign::Any => true,
            AmountSign::Expense => tx.amount.is_sign_negative(),
            AmountSign::Income => tx.amount.is_sign_positive(),
        }
    }
}

// =============================================================================
// Budgets
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStrategy {
    Manual,
    #[serde(rename = "50_30_20")]
    FiftyThirtyTwenty,
    Conservative,
    Custom,
}

impl fmt::Display for BudgetStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BudgetStrategy::Manual => "manual",
            BudgetStrategy::FiftyThirtyTwenty => "50/30/20",
            BudgetStrategy::Conservative => "conservative",
            BudgetStrategy::Custom => "custom",
        };
        f.write_str(label)
    }
}

/// The single active budget for (user, category, period).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub owner_user_id: String,
    pub category_id: Uuid,
    pub period: Period,
    pub limit: Decimal,
    pub strategy: BudgetStrategy,
    pub updated_at: DateTime<Utc>,
}

impl OwnedResource for Budget {
    fn owner_user_id(&self) -> &str {
        &self.owner_user_id
    }
}

// =============================================================================
// Profiles
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub display_name: String,
    /// ISO 4217 code; informational only.
    pub base_currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OwnedResource for UserProfile {
    fn owner_user_id(&self) -> &str {
        &self.user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn period_bounds_and_navigation() {
        let feb = Period::new(2024, 2).unwrap();
        assert_eq!(feb.first_day(), date(2024, 2, 1));
        assert_eq!(feb.last_day(), date(2024, 2, 29));
        assert_eq!(feb.days(), 29);
        assert_eq!(feb.day(31), date(2024, 2, 29));
        assert_eq!(feb.day(0), date(2024, 2, 1));
        assert_eq!(Period::new(2023, 12).unwrap().next(), Period::new(2024, 1).unwrap());
        assert_eq!(Period::new(2024, 1).unwrap().prev(), Period::new(2023, 12).unwrap());
        assert_eq!(feb.to_string(), "2024-02");
        assert_eq!("2024-02".parse::<Period>().unwrap(), feb);
    }

    #[test]
    fn period_rejects_bad_input() {
        assert!(Period::new(2024, 13).is_err());
        assert!("2024".parse::<Period>().is_err());
        assert!("2024-xx".parse::<Period>().is_err());
    }

    #[test]
    fn preceding_months_are_oldest_first() {
        let mar = Period::new(2024, 3).unwrap();
        let prior: Vec<String> = mar.preceding(3).iter().map(|p| p.to_string()).collect();
        assert_eq!(prior, vec!["2023-12", "2024-01", "2024-02"]);
        assert_eq!(Period::new(2023, 11).unwrap().months_until(mar), 4);
    }

    #[test]
    fn bucket_inference() {
        assert_eq!(BudgetBucket::infer("Housing"), BudgetBucket::Needs);
        assert_eq!(BudgetBucket::infer(" food "), BudgetBucket::Needs);
        assert_eq!(BudgetBucket::infer("Savings"), BudgetBucket::Savings);
        assert_eq!(BudgetBucket::infer("Entertainment"), BudgetBucket::Wants);
    }

    #[test]
    fn filter_combines_criteria() {
        let food = Uuid::new_v4();
        let tx = Transaction {
            id: Uuid::new_v4(),
            owner_user_id: "u".into(),
            amount: dec("-20.00"),
            category_id: food,
            date: date(2024, 5, 10),
            note: None,
            created_at: Utc::now(),
            modified_at: Utc::now(),
        };
        let may = Period::new(2024, 5).unwrap();

        assert!(TransactionFilter::all().matches(&tx));
        assert!(TransactionFilter::all().in_period(may).category(food).matches(&tx));
        assert!(!TransactionFilter::all().sign(AmountSign::Income).matches(&tx));
        assert!(!TransactionFilter::all().in_period(may.next()).matches(&tx));
        assert!(!TransactionFilter::all().category(Uuid::new_v4()).matches(&tx));
    }

    #[test]
    fn strategy_serializes_with_stable_tags() {
        assert_eq!(
            serde_json::to_string(&BudgetStrategy::FiftyThirtyTwenty).unwrap(),
            "\"50_30_20\""
        );
        assert_eq!(
            serde_json::to_string(&BudgetStrategy::Conservative).unwrap(),
            "\"conservative\""
        );
    }
}

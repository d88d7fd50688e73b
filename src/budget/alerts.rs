// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Utilization figures and threshold alerts.
//!
//! | Ratio          | Alert     |
//! |----------------|-----------|
//! | `< 0.80`       | none      |
//! | `0.80 ..< 1.0` | warning   |
//! | `>= 1.0`       | critical  |
//!
//! A category gets at most one alert per period, at its highest severity.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::Period;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
}

impl Severity {
    pub fn warning_threshold() -> Decimal {
        Decimal::new(80, 2)
    }

    pub fn critical_threshold() -> Decimal {
        Decimal::ONE
    }

    /// The highest severity reached by `ratio`, if any.
    pub fn for_ratio(ratio: Decimal) -> Option<Self> {
        if ratio >= Self::critical_threshold() {
            Some(Severity::Critical)
        } else if ratio >= Self::warning_threshold() {
            Some(Severity::Warning)
        } else {
            None
        }
    }
}

/// Spent-to-limit figures for one budgeted category and period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Utilization {
    pub category_id: Uuid,
    pub period: Period,
    pub spent: Decimal,
    pub limit: Decimal,
    pub ratio: Decimal,
}

impl Utilization {
    pub fn new(category_id: Uuid, period: Period, spent: Decimal, limit: Decimal) -> Self {
        let ratio = spent.checked_div(limit).unwrap_or(Decimal::ZERO);
        Self {
            category_id,
            period,
            spent,
            limit,
            ratio,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub category_id: Uuid,
    pub category_name: String,
    pub period: Period,
    pub spent: Decimal,
    pub limit: Decimal,
    pub ratio: Decimal,
    pub severity: Severity,
    pub message: String,
}

impl Alert {
    /// Alert for `utilization`, or `None` below the warning threshold.
    pub fn evaluate(utilization: &Utilization, category_name: &str) -> Option<Self> {
        let severity = Severity::for_ratio(utilization.ratio)?;
        let percent = (utilization.ratio * Decimal::ONE_HUNDRED).round_dp(0).normalize();
        let message = match severity {
            Severity::Critical => format!(
                "{category_name} is over budget: spent {} of {} ({percent}%)",
                utilization.spent, utilization.limit
            ),
            Severity::Warning => format!(
                "{category_name} has used {percent}% of its budget ({} of {})",
                utilization.spent, utilization.limit
            ),
        };
        Some(Self {
            category_id: utilization.category_id,
            category_name: category_name.to_string(),
            period: utilization.period,
            spent: utilization.spent,
            limit: utilization.limit,
            ratio: utilization.ratio,
            severity,
            message,
        })
    }
}

/// Critical first, then by ratio descending, then category name.
pub fn rank(alerts: &mut [Alert]) {
    alerts.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b.ratio.cmp(&a.ratio))
            .then_with(|| a.category_name.cmp(&b.category_name))
    });
}

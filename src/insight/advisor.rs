// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Rule-based recommendations over the other insight outputs.

use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use uuid::Uuid;

use super::forecast::{forecast_all, DEFAULT_HORIZON};
use super::summary::{category_breakdown, trends};
use super::{anomaly, Insight, InsightSnapshot};
use crate::budget::{Alert, Severity, Utilization};
use crate::config::InsightConfig;
use crate::models::Period;

/// Months compared by the rising-trend rule.
const TREND_MONTHS: u32 = 3;

/// Most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdviceKind {
    BudgetExceeded,
    ForecastOverBudget,
    BudgetWarning,
    Anomaly,
    RisingTrend,
    Concentration,
    InsufficientHistory,
    Balanced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Advice {
    pub kind: AdviceKind,
    pub category_id: Option<Uuid>,
    pub message: String,
}

impl Advice {
    fn about(kind: AdviceKind, category_id: Uuid, message: String) -> Self {
        Self {
            kind,
            category_id: Some(category_id),
            message,
        }
    }
}

fn budget_advice(snapshot: &InsightSnapshot, period: Period, out: &mut Vec<Advice>) {
    for budget in snapshot.budgets_for(period) {
        let utilization = Utilization::new(
            budget.category_id,
            period,
            snapshot.spent(budget.category_id, period),
            budget.limit,
        );
        let name = snapshot.category_name(budget.category_id);
        if let Some(alert) = Alert::evaluate(&utilization, &name) {
            let kind = match alert.severity {
                Severity::Critical => AdviceKind::BudgetExceeded,
                Severity::Warning => AdviceKind::BudgetWarning,
            };
            out.push(Advice::about(kind, budget.category_id, alert.message));
        }
    }
}

/// Runs only for the snapshot's current month.
fn forecast_advice(
    snapshot: &InsightSnapshot,
    config: &InsightConfig,
    period: Period,
    out: &mut Vec<Advice>,
) {
    if period != snapshot.current_period() {
        return;
    }
    let mut any_ready = false;
    let mut most_available = 0;
    for item in forecast_all(snapshot, config, DEFAULT_HORIZON) {
        let forecast = match item.forecast {
            Insight::Ready(forecast) => forecast,
            Insight::InsufficientData { available, .. } => {
                most_available = most_available.max(available);
                continue;
            }
        };
        any_ready = true;
        let Some(projection) = forecast.current_month() else {
            continue;
        };
        let Some(budget) = snapshot.budget(item.category_id, period) else {
            continue;
        };
        let already_over = snapshot.spent(item.category_id, period) >= budget.limit;
        if projection.predicted > budget.limit && !already_over {
            out.push(Advice::about(
                AdviceKind::ForecastOverBudget,
                item.category_id,
                format!(
                    "{} is on track to reach {} this month, above its budget of {}",
                    item.category_name, projection.predicted, budget.limit
                ),
            ));
        }
    }

    let has_expenses = snapshot.expenses().next().is_some();
    if !any_ready && has_expenses {
        out.push(Advice {
            kind: AdviceKind::InsufficientHistory,
            category_id: None,
            message: format!(
                "Forecasts need {} months of spending history; the longest so far is {}",
                config.forecast_min_months, most_available
            ),
        });
    }
}

fn anomaly_advice(
    snapshot: &InsightSnapshot,
    config: &InsightConfig,
    period: Period,
    out: &mut Vec<Advice>,
) {
    if let Insight::Ready(report) = anomaly::scan(snapshot, config, period) {
        for anomaly in report.flagged {
            out.push(Advice::about(
                AdviceKind::Anomaly,
                anomaly.category_id,
                format!("{} on {}: {}", anomaly.amount, anomaly.date, anomaly.reason),
            ));
        }
    }
}

fn trend_advice(snapshot: &InsightSnapshot, config: &InsightConfig, out: &mut Vec<Advice>) {
    for trend in trends(snapshot, TREND_MONTHS) {
        if trend.change > config.trend_threshold {
            out.push(Advice::about(
                AdviceKind::RisingTrend,
                trend.category_id,
                format!(
                    "{} spending rose {:.0}% from {} to {}",
                    trend.category_name,
                    trend.change * 100.0,
                    trend.from,
                    trend.to
                ),
            ));
        }
    }
}

fn concentration_advice(
    snapshot: &InsightSnapshot,
    config: &InsightConfig,
    period: Period,
    out: &mut Vec<Advice>,
) {
    let shares = category_breakdown(snapshot, period.first_day(), period.last_day());
    if shares.len() < 2 {
        return;
    }
    for share in shares {
        let fraction = share.percentage.to_f64().unwrap_or(0.0) / 100.0;
        if fraction > config.concentration_threshold {
            out.push(Advice::about(
                AdviceKind::Concentration,
                share.category_id,
                format!(
                    "{} accounts for {}% of spending in {}",
                    share.category_name,
                    share.percentage.normalize(),
                    period
                ),
            ));
        }
    }
}

/// Advice for `period`, most urgent first. Never empty: with nothing to
/// report a single [`AdviceKind::Balanced`] entry is returned.
pub fn recommend(snapshot: &InsightSnapshot, config: &InsightConfig, period: Period) -> Vec<Advice> {
    let mut advice = Vec::new();
    budget_advice(snapshot, period, &mut advice);
    forecast_advice(snapshot, config, period, &mut advice);
    anomaly_advice(snapshot, config, period, &mut advice);
    trend_advice(snapshot, config, &mut advice);
    concentration_advice(snapshot, config, period, &mut advice);

    if advice.is_empty() {
        advice.push(Advice {
            kind: AdviceKind::Balanced,
            category_id: None,
            message: format!("Spending in {period} is within budget with no unusual activity"),
        });
    }
    advice.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.message.cmp(&b.message)));
    advice
}

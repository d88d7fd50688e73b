// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Insight Pipeline
//!
//! Read-only analytics over an [`InsightSnapshot`] of one user's data:
//!
//! | Operation                        | Model                                   |
//! |----------------------------------|-----------------------------------------|
//! | [`InsightPipeline::forecast`]    | least-squares line over monthly totals  |
//! | [`InsightPipeline::anomalies`]   | per-category mean and standard deviation|
//! | [`InsightPipeline::suggest_category`] | TF-IDF nearest neighbours over notes |
//! | [`InsightPipeline::cluster`]     | k-means over amount and day of month    |
//! | [`InsightPipeline::recommend`]   | rules over all of the above             |
//! | [`InsightPipeline::monthly_report`] | budget performance, top expenses, change |
//!
//! Too little history is reported as [`Insight::InsufficientData`], never
//! as an error.

pub mod advisor;
pub mod anomaly;
pub mod categorizer;
pub mod cluster;
pub mod forecast;
pub mod model;
pub mod snapshot;
pub mod summary;
pub mod worker;

use std::num::NonZeroU32;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::config::InsightConfig;
use crate::error::{VaultError, VaultResult};
use crate::models::Period;

pub use advisor::{Advice, AdviceKind};
pub use anomaly::{Anomaly, AnomalyReport};
pub use categorizer::Suggestion;
pub use cluster::{ClusterSummary, Clustering};
pub use forecast::{CategoryForecast, Forecast, Projection, TrendDirection, DEFAULT_HORIZON};
pub use snapshot::InsightSnapshot;
pub use summary::{
    BudgetLine, BudgetStatus, CategoryAmount, CategoryShare, MonthTotal, MonthlyReport, MonthlySummary,
    PeriodChange, TopExpense, Trend, YearlyReport,
};
pub use worker::{InsightBundle, InsightWorker};

/// Outcome of an insight computation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum Insight<T> {
    Ready(T),
    /// Not enough history; `required` and `available` count the samples
    /// the model works on (months, transactions or notes).
    InsufficientData { required: usize, available: usize },
}

impl<T> Insight<T> {
    pub fn insufficient(required: usize, available: usize) -> Self {
        Insight::InsufficientData {
            required,
            available,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Insight::Ready(_))
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Insight::Ready(value) => Some(value),
            Insight::InsufficientData { .. } => None,
        }
    }

    pub fn as_ref(&self) -> Insight<&T> {
        match self {
            Insight::Ready(value) => Insight::Ready(value),
            Insight::InsufficientData {
                required,
                available,
            } => Insight::insufficient(*required, *available),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Insight<U> {
        match self {
            Insight::Ready(value) => Insight::Ready(f(value)),
            Insight::InsufficientData {
                required,
                available,
            } => Insight::insufficient(required, available),
        }
    }
}

fn check_horizon(months: u32) -> VaultResult<NonZeroU32> {
    NonZeroU32::new(months)
        .filter(|h| h.get() <= forecast::MAX_HORIZON)
        .ok_or_else(|| {
            VaultError::validation(format!(
                "forecast horizon must be between 1 and {} months, got {months}",
                forecast::MAX_HORIZON
            ))
        })
}

/// Insight operations bound to one snapshot and config. Cheap to clone.
#[derive(Debug, Clone)]
pub struct InsightPipeline {
    snapshot: Arc<InsightSnapshot>,
    config: InsightConfig,
}

impl InsightPipeline {
    pub fn new(snapshot: InsightSnapshot, config: InsightConfig) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
            config,
        }
    }

    pub fn snapshot(&self) -> &InsightSnapshot {
        &self.snapshot
    }

    pub fn config(&self) -> &InsightConfig {
        &self.config
    }

    // ========== Forecasts ==========

    /// Forecast for `horizon` months starting at the snapshot's current
    /// month. Pass [`DEFAULT_HORIZON`] for the current month alone.
    pub fn forecast(&self, category_id: Uuid, horizon: u32) -> VaultResult<Insight<Forecast>> {
        let horizon = check_horizon(horizon)?;
        if self.snapshot.category(category_id).is_none() {
            return Err(VaultError::not_found(format!("category {category_id}")));
        }
        Ok(forecast::forecast(&self.snapshot, &self.config, category_id, horizon))
    }

    pub fn forecast_all(&self, horizon: u32) -> VaultResult<Vec<CategoryForecast>> {
        let horizon = check_horizon(horizon)?;
        Ok(forecast::forecast_all(&self.snapshot, &self.config, horizon))
    }

    // ========== Anomalies & Clusters ==========

    pub fn anomalies(&self, period: Period) -> Insight<AnomalyReport> {
        anomaly::scan(&self.snapshot, &self.config, period)
    }

    pub fn cluster(&self, period: Period) -> Insight<Clustering> {
        cluster::cluster(&self.snapshot, &self.config, period)
    }

    // ========== Categorization ==========

    pub fn suggest_category(&self, note: &str, amount: Decimal) -> Suggestion {
        categorizer::suggest(&self.snapshot, &self.config, note, amount)
    }

    pub fn keywords(&self, category_id: Uuid, limit: usize) -> Vec<String> {
        categorizer::keywords(&self.snapshot, category_id, limit)
    }

    // ========== Summaries ==========

    pub fn monthly_summary(&self, period: Period) -> MonthlySummary {
        summary::monthly_summary(&self.snapshot, period)
    }

    pub fn category_breakdown(&self, from: NaiveDate, to: NaiveDate) -> VaultResult<Vec<CategoryShare>> {
        if from > to {
            return Err(VaultError::validation("range start is after its end"));
        }
        Ok(summary::category_breakdown(&self.snapshot, from, to))
    }

    pub fn trends(&self, months: u32) -> Vec<Trend> {
        summary::trends(&self.snapshot, months)
    }

    // ========== Reports ==========

    /// Month overview with budget performance, the `top_n` largest
    /// expenses and the change from the month before.
    pub fn monthly_report(&self, period: Period, top_n: usize) -> MonthlyReport {
        summary::monthly_report(&self.snapshot, period, top_n)
    }

    pub fn yearly_report(&self, year: i32, top_n: usize) -> VaultResult<YearlyReport> {
        summary::yearly_report(&self.snapshot, year, top_n)
    }

    // ========== Advice ==========

    pub fn recommend(&self, period: Period) -> Vec<Advice> {
        advisor::recommend(&self.snapshot, &self.config, period)
    }

    /// Every insight for `period`. Prefer [`InsightWorker::compute`] from
    /// async code.
    pub fn bundle(&self, period: Period) -> InsightBundle {
        InsightBundle {
            period,
            as_of: self.snapshot.as_of(),
            forecasts: forecast::forecast_all(&self.snapshot, &self.config, DEFAULT_HORIZON),
            anomalies: self.anomalies(period),
            clustering: self.cluster(period),
            summary: self.monthly_summary(period),
            advice: self.recommend(period),
        }
    }
}

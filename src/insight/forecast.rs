// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Spending forecast per category, one or more months ahead.
//!
//! The series is the category's monthly expense total over the complete
//! months of the history window, starting at its first month with spending
//! (later empty months count as zero). An ordinary least-squares line over
//! that series projects the current month and the months after it. Each
//! band is the 95 % prediction interval of the line at that month, so it
//! widens the further the projection runs from the observed history.

use std::num::NonZeroU32;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::model::{mean, to_amount, to_f64, Estimator, Predictor};
use super::{Insight, InsightSnapshot};
use crate::config::InsightConfig;
use crate::models::{CategoryKind, Period};

const BAND_Z: f64 = 1.96;

/// Months projected when the caller does not ask for more.
pub const DEFAULT_HORIZON: NonZeroU32 = NonZeroU32::MIN;
/// Longest horizon accepted.
pub const MAX_HORIZON: u32 = 36;
/// Slopes under one cent a month count as flat.
const FLAT_SLOPE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl TrendDirection {
    pub fn of_slope(slope: f64) -> Self {
        if slope > FLAT_SLOPE {
            TrendDirection::Increasing
        } else if slope < -FLAT_SLOPE {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        }
    }
}

/// Ordinary least squares over `y[i]` at `x = i`.
#[derive(Debug, Clone)]
pub struct LinearTrend {
    pub min_points: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
    pub residual_std: f64,
    pub r_squared: f64,
    pub points: usize,
}

impl LineFit {
    /// Half-width of the prediction interval at `x`.
    pub fn band(&self, x: f64) -> f64 {
        let n = self.points as f64;
        let mx = (n - 1.0) / 2.0;
        let sxx = n * (n * n - 1.0) / 12.0;
        BAND_Z * self.residual_std * (1.0 + 1.0 / n + (x - mx).powi(2) / sxx).sqrt()
    }
}

impl Estimator for LinearTrend {
    type Sample = f64;
    type Fitted = LineFit;

    fn fit(&self, samples: &[f64]) -> Insight<LineFit> {
        let n = samples.len();
        if n < self.min_points.max(2) {
            return Insight::insufficient(self.min_points.max(2), n);
        }
        let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let mx = mean(&xs);
        let my = mean(samples);
        let sxx: f64 = xs.iter().map(|x| (x - mx).powi(2)).sum();
        let sxy: f64 = xs.iter().zip(samples).map(|(x, y)| (x - mx) * (y - my)).sum();
        let slope = sxy / sxx;
        let intercept = my - slope * mx;

        let ssr: f64 = xs
            .iter()
            .zip(samples)
            .map(|(x, y)| (y - (intercept + slope * x)).powi(2))
            .sum();
        let sst: f64 = samples.iter().map(|y| (y - my).powi(2)).sum();
        let residual_std = if n > 2 { (ssr / (n - 2) as f64).sqrt() } else { 0.0 };
        let r_squared = if sst > 0.0 { 1.0 - ssr / sst } else { 1.0 };

        Insight::Ready(LineFit {
            slope,
            intercept,
            residual_std,
            r_squared,
            points: n,
        })
    }
}

impl Predictor for LinearTrend {
    type Input = f64;
    type Output = f64;

    fn predict(&self, model: &LineFit, x: &f64) -> f64 {
        model.intercept + model.slope * x
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Projection {
    pub period: Period,
    pub predicted: Decimal,
    pub lower: Decimal,
    pub upper: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub category_id: Uuid,
    /// One per month of the horizon, starting at the current month.
    pub projections: Vec<Projection>,
    /// Goodness of fit (R squared) of the trend line.
    pub confidence: f64,
    pub trend: TrendDirection,
    pub history_months: usize,
    pub historical_average: Decimal,
}

impl Forecast {
    pub fn current_month(&self) -> Option<&Projection> {
        self.projections.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryForecast {
    pub category_id: Uuid,
    pub category_name: String,
    pub forecast: Insight<Forecast>,
}

/// Monthly totals from the category's first active month in the window.
fn series(snapshot: &InsightSnapshot, config: &InsightConfig, category_id: Uuid) -> Vec<f64> {
    let window = snapshot.history_window(config.history_months);
    let totals = snapshot.monthly_spend(category_id, &window);
    totals
        .into_iter()
        .skip_while(|t| t.is_zero())
        .map(to_f64)
        .collect()
}

pub fn forecast(
    snapshot: &InsightSnapshot,
    config: &InsightConfig,
    category_id: Uuid,
    horizon: NonZeroU32,
) -> Insight<Forecast> {
    let history = series(snapshot, config, category_id);
    let model = LinearTrend {
        min_points: config.forecast_min_months,
    };
    model.fit(&history).map(|fit| {
        let mut period = snapshot.current_period();
        let mut projections = Vec::with_capacity(horizon.get() as usize);
        for step in 0..horizon.get() as usize {
            let x = (history.len() + step) as f64;
            let predicted = model.predict(&fit, &x);
            let half_band = fit.band(x);
            projections.push(Projection {
                period,
                predicted: to_amount(predicted.max(0.0)),
                lower: to_amount((predicted - half_band).max(0.0)),
                upper: to_amount((predicted + half_band).max(0.0)),
            });
            period = period.next();
        }
        Forecast {
            category_id,
            projections,
            confidence: fit.r_squared,
            trend: TrendDirection::of_slope(fit.slope),
            history_months: fit.points,
            historical_average: to_amount(mean(&history)),
        }
    })
}

/// Forecasts for every expense category, by name.
pub fn forecast_all(
    snapshot: &InsightSnapshot,
    config: &InsightConfig,
    horizon: NonZeroU32,
) -> Vec<CategoryForecast> {
    let mut categories: Vec<_> = snapshot
        .categories()
        .iter()
        .filter(|c| c.kind == CategoryKind::Expense)
        .collect();
    categories.sort_by(|a, b| a.name.cmp(&b.name));
    categories
        .into_iter()
        .map(|c| CategoryForecast {
            category_id: c.id,
            category_name: c.name.clone(),
            forecast: forecast(snapshot, config, c.id, horizon),
        })
        .collect()
}

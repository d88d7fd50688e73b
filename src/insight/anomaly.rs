// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-category outlier detection.
//!
//! Each category's expense magnitudes before the scanned period give a mean
//! and spread; a transaction in the period is flagged when its magnitude is
//! above `mean + sigma * std`. Flags are informational only.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::model::{mean, std_dev, to_amount, to_f64, Estimator, Predictor};
use super::{Insight, InsightSnapshot};
use crate::config::InsightConfig;
use crate::models::{Period, Transaction};

/// Spreads below one cent are treated as one cent when scoring.
const MIN_SPREAD: f64 = 0.01;

/// Mean and population standard deviation of past amounts; predicts a
/// z-score.
#[derive(Debug, Clone)]
pub struct SpreadEstimator {
    pub min_samples: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spread {
    pub mean: f64,
    pub std: f64,
    pub samples: usize,
}

impl Spread {
    pub fn threshold(&self, sigma: f64) -> f64 {
        self.mean + sigma * self.std
    }
}

impl Estimator for SpreadEstimator {
    type Sample = f64;
    type Fitted = Spread;

    fn fit(&self, samples: &[f64]) -> Insight<Spread> {
        if samples.len() < self.min_samples {
            return Insight::insufficient(self.min_samples, samples.len());
        }
        Insight::Ready(Spread {
            mean: mean(samples),
            std: std_dev(samples),
            samples: samples.len(),
        })
    }
}

impl Predictor for SpreadEstimator {
    type Input = f64;
    type Output = f64;

    fn predict(&self, model: &Spread, value: &f64) -> f64 {
        (value - model.mean) / model.std.max(MIN_SPREAD)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub transaction_id: Uuid,
    pub category_id: Uuid,
    pub category_name: String,
    pub date: NaiveDate,
    /// Magnitude of the expense.
    pub amount: Decimal,
    pub category_mean: Decimal,
    pub z_score: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub period: Period,
    pub sigma: f64,
    /// Highest z-score first.
    pub flagged: Vec<Anomaly>,
    /// Categories with spending in the period but too little history.
    pub unscored_categories: Vec<Uuid>,
}

impl AnomalyReport {
    pub fn is_flagged(&self, transaction_id: Uuid) -> bool {
        self.flagged.iter().any(|a| a.transaction_id == transaction_id)
    }
}

pub fn scan(snapshot: &InsightSnapshot, config: &InsightConfig, period: Period) -> Insight<AnomalyReport> {
    let mut by_category: BTreeMap<Uuid, Vec<&Transaction>> = BTreeMap::new();
    for tx in snapshot.expenses_in(period) {
        by_category.entry(tx.category_id).or_default().push(tx);
    }

    let estimator = SpreadEstimator {
        min_samples: config.anomaly_min_history,
    };
    let mut flagged = Vec::new();
    let mut unscored = Vec::new();
    let mut best_history = 0;

    for (category_id, current) in &by_category {
        let prior: Vec<f64> = snapshot
            .expenses()
            .filter(|tx| tx.category_id == *category_id && tx.date < period.first_day())
            .map(|tx| to_f64(tx.amount.abs()))
            .collect();
        best_history = best_history.max(prior.len());

        let Insight::Ready(spread) = estimator.fit(&prior) else {
            unscored.push(*category_id);
            continue;
        };
        let threshold = spread.threshold(config.anomaly_sigma);
        let name = snapshot.category_name(*category_id);

        for tx in current {
            let magnitude = to_f64(tx.amount.abs());
            if magnitude <= threshold {
                continue;
            }
            let z_score = estimator.predict(&spread, &magnitude);
            flagged.push(Anomaly {
                transaction_id: tx.id,
                category_id: *category_id,
                category_name: name.clone(),
                date: tx.date,
                amount: tx.amount.abs(),
                category_mean: to_amount(spread.mean),
                z_score,
                reason: format!(
                    "Unusually high for {name}: {z_score:.2} standard deviations above the mean of {}",
                    to_amount(spread.mean)
                ),
            });
        }
    }

    if !by_category.is_empty() && unscored.len() == by_category.len() {
        return Insight::insufficient(config.anomaly_min_history, best_history);
    }

    flagged.sort_by(|a, b| {
        b.z_score
            .total_cmp(&a.z_score)
            .then(a.date.cmp(&b.date))
            .then(a.transaction_id.cmp(&b.transaction_id))
    });
    Insight::Ready(AnomalyReport {
        period,
        sigma: config.anomaly_sigma,
        flagged,
        unscored_categories: unscored,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, CategoryKind};
    use crate::test_support::{category, date, dec, tx};

    fn history(cat: &Category) -> Vec<Transaction> {
        ["-10", "-12", "-11", "-9", "-10", "-13"]
            .iter()
            .enumerate()
            .map(|(i, amount)| tx(cat, amount, date(2024, 5, 1 + i as u32)))
            .collect()
    }

    #[test]
    fn flags_outlier_and_leaves_normal_spend() {
        let food = category("Food", CategoryKind::Expense);
        let mut txs = history(&food);
        let normal = tx(&food, "-12", date(2024, 6, 4));
        let outlier = tx(&food, "-80", date(2024, 6, 9));
        txs.push(normal.clone());
        txs.push(outlier.clone());
        let snapshot = InsightSnapshot::from_parts(date(2024, 6, 30), txs, vec![food], vec![]);

        let report = scan(&snapshot, &InsightConfig::default(), Period::new(2024, 6).unwrap())
            .ready()
            .unwrap();
        assert_eq!(report.flagged.len(), 1);
        assert!(report.is_flagged(outlier.id));
        assert!(!report.is_flagged(normal.id));
        assert_eq!(report.flagged[0].amount, dec("80"));
        assert!(report.flagged[0].z_score > 2.0);
        // Scanning never touches the snapshot.
        assert_eq!(snapshot.transactions().len(), 8);
    }

    #[test]
    fn sparse_history_is_insufficient() {
        let food = category("Food", CategoryKind::Expense);
        let txs = vec![
            tx(&food, "-10", date(2024, 5, 1)),
            tx(&food, "-10", date(2024, 5, 2)),
            tx(&food, "-500", date(2024, 6, 2)),
        ];
        let snapshot = InsightSnapshot::from_parts(date(2024, 6, 30), txs, vec![food], vec![]);
        assert_eq!(
            scan(&snapshot, &InsightConfig::default(), Period::new(2024, 6).unwrap()),
            Insight::InsufficientData {
                required: 5,
                available: 2
            }
        );
    }

    #[test]
    fn unscored_categories_are_listed() {
        let food = category("Food", CategoryKind::Expense);
        let fun = category("Fun", CategoryKind::Expense);
        let mut txs = history(&food);
        txs.push(tx(&food, "-11", date(2024, 6, 3)));
        txs.push(tx(&fun, "-300", date(2024, 6, 3)));
        let snapshot =
            InsightSnapshot::from_parts(date(2024, 6, 30), txs, vec![food, fun.clone()], vec![]);

        let report = scan(&snapshot, &InsightConfig::default(), Period::new(2024, 6).unwrap())
            .ready()
            .unwrap();
        assert!(report.flagged.is_empty());
        assert_eq!(report.unscored_categories, vec![fun.id]);
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Spending behaviour clusters for one period.
//!
//! Features per expense: `ln(1 + |amount|)` and day-of-month / 31, each
//! standardized. k-means starts from evenly spaced points of the
//! amount-sorted sample, so results are deterministic. Labels are ordered
//! by cluster amount, smallest first.

use std::collections::BTreeMap;

use chrono::Datelike;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::model::{mean, std_dev, to_f64, Estimator, Predictor};
use super::{Insight, InsightSnapshot};
use crate::config::InsightConfig;
use crate::models::{Period, Transaction};

const MAX_ITERATIONS: usize = 100;

pub type Point = [f64; 2];

fn distance2(a: &Point, b: &Point) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)
}

#[derive(Debug, Clone)]
pub struct KMeans {
    pub k: usize,
    pub min_points: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Centroids {
    pub centers: Vec<Point>,
}

impl KMeans {
    fn nearest(centers: &[Point], point: &Point) -> usize {
        let mut best = 0;
        for (i, center) in centers.iter().enumerate().skip(1) {
            if distance2(point, center) < distance2(point, &centers[best]) {
                best = i;
            }
        }
        best
    }
}

impl Estimator for KMeans {
    type Sample = Point;
    type Fitted = Centroids;

    fn fit(&self, points: &[Point]) -> Insight<Centroids> {
        let k = self.k.max(1);
        let required = self.min_points.max(k);
        if points.len() < required {
            return Insight::insufficient(required, points.len());
        }

        let mut sorted = points.to_vec();
        sorted.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));
        let n = sorted.len();
        let mut centers: Vec<Point> = (0..k).map(|i| sorted[(2 * i + 1) * n / (2 * k)]).collect();

        let mut assignment = vec![usize::MAX; n];
        for _ in 0..MAX_ITERATIONS {
            let mut changed = false;
            for (slot, point) in assignment.iter_mut().zip(points) {
                let nearest = Self::nearest(&centers, point);
                if *slot != nearest {
                    *slot = nearest;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
            for (c, center) in centers.iter_mut().enumerate() {
                let members: Vec<&Point> = points
                    .iter()
                    .zip(&assignment)
                    .filter(|(_, a)| **a == c)
                    .map(|(p, _)| p)
                    .collect();
                // An empty cluster keeps its previous center.
                if !members.is_empty() {
                    let len = members.len() as f64;
                    *center = [
                        members.iter().map(|p| p[0]).sum::<f64>() / len,
                        members.iter().map(|p| p[1]).sum::<f64>() / len,
                    ];
                }
            }
        }
        Insight::Ready(Centroids { centers })
    }
}

impl Predictor for KMeans {
    type Input = Point;
    type Output = usize;

    fn predict(&self, model: &Centroids, point: &Point) -> usize {
        Self::nearest(&model.centers, point)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub label: usize,
    pub name: String,
    pub size: usize,
    pub mean_amount: Decimal,
    pub dominant_category: Uuid,
    pub dominant_category_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Clustering {
    pub period: Period,
    pub assignments: BTreeMap<Uuid, usize>,
    pub clusters: Vec<ClusterSummary>,
}

fn cluster_name(label: usize, count: usize) -> String {
    match (count, label) {
        (3, 0) => "small purchases".to_string(),
        (3, 1) => "regular spending".to_string(),
        (3, 2) => "large expenses".to_string(),
        _ => format!("spending group {}", label + 1),
    }
}

fn standardize(values: &mut [f64]) {
    let m = mean(values);
    let s = std_dev(values);
    let s = if s > 0.0 { s } else { 1.0 };
    values.iter_mut().for_each(|v| *v = (*v - m) / s);
}

pub fn cluster(snapshot: &InsightSnapshot, config: &InsightConfig, period: Period) -> Insight<Clustering> {
    let expenses: Vec<&Transaction> = snapshot.expenses_in(period).collect();

    let mut amounts: Vec<f64> = expenses
        .iter()
        .map(|tx| to_f64(tx.amount.abs()).ln_1p())
        .collect();
    let mut days: Vec<f64> = expenses.iter().map(|tx| tx.date.day() as f64 / 31.0).collect();
    standardize(&mut amounts);
    standardize(&mut days);
    let points: Vec<Point> = amounts.into_iter().zip(days).map(|(a, d)| [a, d]).collect();

    let model = KMeans {
        k: config.cluster_count,
        min_points: config.cluster_min_points,
    };
    model.fit(&points).map(|centroids| {
        let raw: Vec<usize> = points.iter().map(|p| model.predict(&centroids, p)).collect();

        // Relabel non-empty clusters by center amount, ascending.
        let mut used: Vec<usize> = raw.clone();
        used.sort_unstable();
        used.dedup();
        used.sort_by(|a, b| centroids.centers[*a][0].total_cmp(&centroids.centers[*b][0]));
        let relabel: BTreeMap<usize, usize> =
            used.iter().enumerate().map(|(new, old)| (*old, new)).collect();

        let mut assignments = BTreeMap::new();
        let mut members: Vec<Vec<&Transaction>> = vec![Vec::new(); used.len()];
        for (tx, old) in expenses.iter().zip(&raw) {
            let label = relabel[old];
            assignments.insert(tx.id, label);
            members[label].push(tx);
        }

        let clusters = members
            .iter()
            .enumerate()
            .map(|(label, txs)| {
                let total: Decimal = txs.iter().map(|tx| tx.amount.abs()).sum();
                let mut per_category: BTreeMap<Uuid, Decimal> = BTreeMap::new();
                for tx in txs {
                    *per_category.entry(tx.category_id).or_insert(Decimal::ZERO) += tx.amount.abs();
                }
                let dominant = per_category
                    .iter()
                    .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
                    .map(|(id, _)| *id)
                    .unwrap_or_default();
                ClusterSummary {
                    label,
                    name: cluster_name(label, used.len()),
                    size: txs.len(),
                    mean_amount: (total / Decimal::from(txs.len().max(1))).round_dp(2),
                    dominant_category: dominant,
                    dominant_category_name: snapshot.category_name(dominant),
                }
            })
            .collect();

        Clustering {
            period,
            assignments,
            clusters,
        }
    })
}

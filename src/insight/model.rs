// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Capability interface for the small in-process models.
//!
//! Each algorithm is an [`Estimator`] (fit on samples) and a [`Predictor`]
//! (apply the fitted model). Fitting on too few samples yields
//! [`Insight::InsufficientData`] instead of a model.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use super::Insight;

pub trait Estimator {
    type Sample;
    type Fitted;

    fn fit(&self, samples: &[Self::Sample]) -> Insight<Self::Fitted>;
}

pub trait Predictor: Estimator {
    type Input: ?Sized;
    type Output;

    fn predict(&self, model: &Self::Fitted, input: &Self::Input) -> Self::Output;
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

pub(crate) fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Money amount from a model output, rounded to cents.
pub(crate) fn to_amount(value: f64) -> Decimal {
    Decimal::from_f64(value)
        .unwrap_or(Decimal::ZERO)
        .round_dp(2)
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Runs insight computations off the async executor.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};

use super::advisor::Advice;
use super::anomaly::AnomalyReport;
use super::cluster::Clustering;
use super::forecast::CategoryForecast;
use super::summary::MonthlySummary;
use super::{Insight, InsightPipeline};
use crate::error::{VaultError, VaultResult};
use crate::models::Period;

/// Every insight for one period, computed from a single snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightBundle {
    pub period: Period,
    pub as_of: NaiveDate,
    pub forecasts: Vec<CategoryForecast>,
    pub anomalies: Insight<AnomalyReport>,
    pub clustering: Insight<Clustering>,
    pub summary: MonthlySummary,
    pub advice: Vec<Advice>,
}

/// Hands pipeline work to tokio's blocking pool so callers on an async
/// runtime never stall it with model fitting.
#[derive(Clone)]
pub struct InsightWorker {
    pipeline: Arc<InsightPipeline>,
}

impl InsightWorker {
    pub fn new(pipeline: InsightPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn pipeline(&self) -> &InsightPipeline {
        &self.pipeline
    }

    pub async fn compute(&self, period: Period) -> VaultResult<InsightBundle> {
        let pipeline = Arc::clone(&self.pipeline);
        debug!(period = %period, "Insight bundle requested");
        tokio::task::spawn_blocking(move || pipeline.bundle(period))
            .await
            .map_err(|e| {
                warn!(error = %e, "Insight task panicked");
                VaultError::Io(std::io::Error::other(e.to_string()))
            })
    }
}

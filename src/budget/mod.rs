// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Budget Engine
//!
//! - [`BudgetEngine`]: one budget per (category, period), utilization and
//!   threshold alerts
//! - [`strategy`]: income-based generation (50/30/20, conservative, custom)
//!   and the surplus heuristic
//! - [`alerts`]: warning at 80 %, critical at 100 %

pub mod alerts;
pub mod engine;
pub mod strategy;

pub use alerts::{Alert, Severity, Utilization};
pub use engine::BudgetEngine;
pub use strategy::{AllocationTarget, BudgetPlan, Pressure, Recommendation};

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Finance Vault - Local-first Secure Transaction Store + Budget/Insight Engine
//!
//! Single-user personal finance core: every record is encrypted at rest
//! under a key derived from the user's password, budgets are checked against
//! live transaction totals, and a small in-process insight pipeline derives
//! forecasts, anomalies, category suggestions and clusters.
//!
//! ## Modules
//!
//! - `auth` - AuthGate contract, local accounts, sessions with idle eviction
//! - `budget` - Budget definitions, utilization, alerts, generation strategies
//! - `crypto` - Argon2id key derivation, password hashing, AES-256-GCM
//! - `insight` - Forecasts, anomaly scan, categorizer, clustering, advice
//! - `import_export` - CSV / JSON transaction import and export
//! - `storage` - Encrypted store file, backups, user-scoped repositories
//! - `vault` - Shared state tying the above together

pub mod auth;
pub mod budget;
pub mod config;
pub mod crypto;
pub mod error;
pub mod import_export;
pub mod insight;
pub mod logging;
pub mod models;
pub mod storage;
pub mod vault;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{VaultError, VaultResult};
pub use vault::Vault;

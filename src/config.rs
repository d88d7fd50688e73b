// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! typed [`VaultConfig`] built from them. Invalid values fall back to the
//! default with a warning.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `FINANCE_VAULT_DATA_DIR` | Directory holding the store file and backups | `./finance-vault-data` |
//! | `FINANCE_VAULT_BACKUP_RETENTION` | Number of backup snapshots kept | `5` |
//! | `FINANCE_VAULT_SNAPSHOT_ON_WRITE` | Take a snapshot after every write batch | `true` |
//! | `FINANCE_VAULT_ROTATION_SECS` | Interval of the background rotator | `3600` |
//! | `FINANCE_VAULT_IDLE_TIMEOUT_SECS` | Session idle timeout before key eviction | `900` |
//! | `FINANCE_VAULT_FUTURE_DAYS` | How far ahead a transaction date may be | `90` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,finance_vault=debug` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::warn;

use crate::crypto::KdfParams;

/// Environment variable name for the data directory.
pub const DATA_DIR_ENV: &str = "FINANCE_VAULT_DATA_DIR";

/// Environment variable name for the backup retention count.
pub const BACKUP_RETENTION_ENV: &str = "FINANCE_VAULT_BACKUP_RETENTION";

/// Environment variable name toggling a snapshot after each write batch.
pub const SNAPSHOT_ON_WRITE_ENV: &str = "FINANCE_VAULT_SNAPSHOT_ON_WRITE";

/// Environment variable name for the background rotation interval (seconds).
pub const ROTATION_SECS_ENV: &str = "FINANCE_VAULT_ROTATION_SECS";

/// Environment variable name for the session idle timeout (seconds).
pub const IDLE_TIMEOUT_SECS_ENV: &str = "FINANCE_VAULT_IDLE_TIMEOUT_SECS";

/// Environment variable name for the future-date tolerance (days).
pub const FUTURE_DAYS_ENV: &str = "FINANCE_VAULT_FUTURE_DAYS";

/// Environment variable name for the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_DATA_DIR: &str = "./finance-vault-data";
pub const DEFAULT_BACKUP_RETENTION: usize = 5;
pub const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_secs(3600);
/// Shorter rotation intervals are raised to this.
pub const MIN_ROTATION_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(900);
pub const DEFAULT_SPEND_CACHE_CAPACITY: usize = 256;

/// Input limits applied by the transaction repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRules {
    /// Largest accepted absolute amount.
    pub max_amount: Decimal,
    pub max_note_len: usize,
    /// How many days past today a transaction date may be.
    pub future_tolerance_days: i64,
    pub max_past_years: i32,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            max_amount: Decimal::from(1_000_000),
            max_note_len: 500,
            future_tolerance_days: 90,
            max_past_years: 10,
        }
    }
}

/// Thresholds and minimum-history requirements of the insight pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct InsightConfig {
    /// Months of history considered by forecasts, trends and budget generation.
    pub history_months: u32,
    pub forecast_min_months: usize,
    pub anomaly_sigma: f64,
    /// Prior transactions a category needs before it is scored.
    pub anomaly_min_history: usize,
    pub categorizer_min_samples: usize,
    pub categorizer_neighbors: usize,
    pub cluster_count: usize,
    pub cluster_min_points: usize,
    /// Month-over-month increase (fraction) reported as a rising trend.
    pub trend_threshold: f64,
    /// Share of total spend in one category reported as concentration.
    pub concentration_threshold: f64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            history_months: 6,
            forecast_min_months: 3,
            anomaly_sigma: 2.0,
            anomaly_min_history: 5,
            categorizer_min_samples: 50,
            categorizer_neighbors: 5,
            cluster_count: 3,
            cluster_min_points: 20,
            trend_threshold: 0.25,
            concentration_threshold: 0.40,
        }
    }
}

/// Complete configuration of a [`crate::vault::Vault`].
#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub data_dir: PathBuf,
    pub backup_retention: usize,
    pub snapshot_on_write: bool,
    pub rotation_interval: Duration,
    pub idle_timeout: Duration,
    pub spend_cache_capacity: usize,
    pub rules: ValidationRules,
    pub insight: InsightConfig,
    /// Argon2id cost settings for new accounts; each account gets its own salt.
    pub kdf: KdfParams,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            backup_retention: DEFAULT_BACKUP_RETENTION,
            snapshot_on_write: true,
            rotation_interval: DEFAULT_ROTATION_INTERVAL,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            spend_cache_capacity: DEFAULT_SPEND_CACHE_CAPACITY,
            rules: ValidationRules::default(),
            insight: InsightConfig::default(),
            kdf: KdfParams::default(),
        }
    }
}

impl VaultConfig {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary lookup (used by `from_env` and tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        config.backup_retention = parse_or(&lookup, BACKUP_RETENTION_ENV, config.backup_retention)
            .max(1);
        config.snapshot_on_write =
            parse_or(&lookup, SNAPSHOT_ON_WRITE_ENV, config.snapshot_on_write);
        config.rotation_interval = Duration::from_secs(parse_or(
            &lookup,
            ROTATION_SECS_ENV,
            DEFAULT_ROTATION_INTERVAL.as_secs(),
        ))
        .max(MIN_ROTATION_INTERVAL);
        config.idle_timeout = Duration::from_secs(parse_or(
            &lookup,
            IDLE_TIMEOUT_SECS_ENV,
            DEFAULT_IDLE_TIMEOUT.as_secs(),
        ));
        config.rules.future_tolerance_days =
            parse_or(&lookup, FUTURE_DAYS_ENV, config.rules.future_tolerance_days).max(0);

        config
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Debug,
{
    match lookup(name) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(variable = name, value = %raw, fallback = ?default, "Invalid config value, using default");
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = VaultConfig::from_lookup(|_| None);
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(config.backup_retention, 5);
        assert!(config.snapshot_on_write);
        assert_eq!(config.idle_timeout, Duration::from_secs(900));
        assert_eq!(config.rules.future_tolerance_days, 90);
        assert_eq!(config.insight.forecast_min_months, 3);
    }

    #[test]
    fn reads_overrides() {
        let config = VaultConfig::from_lookup(lookup_from(&[
            (DATA_DIR_ENV, "/tmp/vault"),
            (BACKUP_RETENTION_ENV, "3"),
            (SNAPSHOT_ON_WRITE_ENV, "false"),
            (IDLE_TIMEOUT_SECS_ENV, "60"),
            (FUTURE_DAYS_ENV, "7"),
        ]));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/vault"));
        assert_eq!(config.backup_retention, 3);
        assert!(!config.snapshot_on_write);
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
        assert_eq!(config.rules.future_tolerance_days, 7);
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = VaultConfig::from_lookup(lookup_from(&[
            (BACKUP_RETENTION_ENV, "many"),
            (ROTATION_SECS_ENV, "-5"),
        ]));
        assert_eq!(config.backup_retention, DEFAULT_BACKUP_RETENTION);
        assert_eq!(config.rotation_interval, DEFAULT_ROTATION_INTERVAL);
    }

    #[test]
    fn zero_rotation_interval_is_raised() {
        let config = VaultConfig::from_lookup(lookup_from(&[(ROTATION_SECS_ENV, "0")]));
        assert_eq!(config.rotation_interval, MIN_ROTATION_INTERVAL);
        let config = VaultConfig::from_lookup(lookup_from(&[(ROTATION_SECS_ENV, "30")]));
        assert_eq!(config.rotation_interval, Duration::from_secs(30));
    }

    #[test]
    fn retention_is_at_least_one() {
        let config = VaultConfig::from_lookup(lookup_from(&[(BACKUP_RETENTION_ENV, "0")]));
        assert_eq!(config.backup_retention, 1);
    }
}

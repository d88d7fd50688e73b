// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! CSV / JSON import and export of transactions.
//!
//! Import rows carry `amount, category, date, note?`. The category is
//! matched by name (case-insensitive) and the amount's sign is taken from
//! the category kind, so `12.50` under an expense category is stored as
//! `-12.50`. Rows that fail to parse or validate are skipped and reported;
//! they never abort the whole import.

use std::collections::HashMap;
use std::io;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{VaultError, VaultResult};
use crate::models::{Category, CategoryKind, NewTransaction, TransactionFilter};
use crate::storage::{CategoryRepository, TransactionRepository};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A skipped import row. `row` counts data rows from 1, header excluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: Vec<Uuid>,
    pub errors: Vec<RowError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub id: Uuid,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub category: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    amount: String,
    category: String,
    date: String,
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonAmount {
    Text(String),
    Number(serde_json::Number),
}

#[derive(Debug, Deserialize)]
struct JsonRow {
    amount: JsonAmount,
    category: String,
    date: String,
    #[serde(default)]
    note: Option<String>,
}

/// Fields of one row before parsing.
struct RawRow {
    amount: String,
    category: String,
    date: String,
    note: Option<String>,
}

impl From<CsvRow> for RawRow {
    fn from(row: CsvRow) -> Self {
        Self {
            amount: row.amount,
            category: row.category,
            date: row.date,
            note: row.note,
        }
    }
}

impl From<JsonRow> for RawRow {
    fn from(row: JsonRow) -> Self {
        Self {
            amount: match row.amount {
                JsonAmount::Text(text) => text,
                JsonAmount::Number(number) => number.to_string(),
            },
            category: row.category,
            date: row.date,
            note: row.note,
        }
    }
}

/// The user's categories by lowercase name.
struct CategoryIndex(HashMap<String, Vec<Category>>);

impl CategoryIndex {
    fn new(categories: Vec<Category>) -> Self {
        let mut index: HashMap<String, Vec<Category>> = HashMap::new();
        for category in categories {
            index.entry(category.name.to_lowercase()).or_default().push(category);
        }
        Self(index)
    }

    /// A name shared by an income and an expense category resolves by the
    /// raw amount's sign: positive picks income.
    fn resolve(&self, name: &str, amount: Decimal) -> Option<&Category> {
        let candidates = self.0.get(&name.trim().to_lowercase())?;
        let preferred = if amount.is_sign_positive() && candidates.len() > 1 {
            CategoryKind::Income
        } else {
            CategoryKind::Expense
        };
        candidates
            .iter()
            .find(|c| c.kind == preferred)
            .or_else(|| candidates.first())
    }
}

pub struct ImportExport<'a> {
    categories: CategoryRepository<'a>,
    transactions: TransactionRepository<'a>,
}

impl<'a> ImportExport<'a> {
    pub fn new(categories: CategoryRepository<'a>, transactions: TransactionRepository<'a>) -> Self {
        Self {
            categories,
            transactions,
        }
    }

    // ========== Import ==========

    /// Import CSV with a header row naming `amount`, `category`, `date` and
    /// optionally `note`.
    pub fn import_csv<R: io::Read>(&self, input: R) -> VaultResult<ImportReport> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(input);
        let rows: Vec<Result<RawRow, String>> = reader
            .deserialize::<CsvRow>()
            .map(|row| row.map(RawRow::from).map_err(|e| e.to_string()))
            .collect();
        self.import_rows(rows)
    }

    /// Import a JSON array of row objects. `amount` may be a number or a
    /// string.
    pub fn import_json(&self, input: &str) -> VaultResult<ImportReport> {
        let values: Vec<serde_json::Value> = serde_json::from_str(input)
            .map_err(|e| VaultError::validation(format!("expected a JSON array of rows: {e}")))?;
        let rows = values
            .into_iter()
            .map(|value| {
                serde_json::from_value::<JsonRow>(value)
                    .map(RawRow::from)
                    .map_err(|e| e.to_string())
            })
            .collect();
        self.import_rows(rows)
    }

    fn import_rows(&self, rows: Vec<Result<RawRow, String>>) -> VaultResult<ImportReport> {
        let index = CategoryIndex::new(self.categories.list()?);
        let mut report = ImportReport::default();

        for (i, row) in rows.into_iter().enumerate() {
            let row_number = i + 1;
            let outcome = match row {
                Ok(raw) => self.import_row(&index, raw)?,
                Err(reason) => Err(reason),
            };
            match outcome {
                Ok(id) => report.imported.push(id),
                Err(reason) => {
                    warn!(row = row_number, reason = %reason, "Import row skipped");
                    report.errors.push(RowError {
                        row: row_number,
                        reason,
                    });
                }
            }
        }

        info!(
            imported = report.imported.len(),
            skipped = report.errors.len(),
            "Import finished"
        );
        Ok(report)
    }

    /// Inner `Err` is a row problem; outer `Err` aborts the import.
    fn import_row(&self, index: &CategoryIndex, raw: RawRow) -> VaultResult<Result<Uuid, String>> {
        let amount = match Decimal::from_str(raw.amount.trim()) {
            Ok(amount) => amount,
            Err(_) => return Ok(Err(format!("invalid amount '{}'", raw.amount))),
        };
        let Some(category) = index.resolve(&raw.category, amount) else {
            return Ok(Err(format!("unknown category '{}'", raw.category.trim())));
        };
        let date = match NaiveDate::parse_from_str(raw.date.trim(), DATE_FORMAT) {
            Ok(date) => date,
            Err(_) => {
                return Ok(Err(format!(
                    "invalid date '{}', expected YYYY-MM-DD",
                    raw.date
                )))
            }
        };
        let amount = match category.kind {
            CategoryKind::Expense => -amount.abs(),
            CategoryKind::Income => amount.abs(),
        };

        let new = NewTransaction {
            amount,
            category_id: category.id,
            date,
            note: raw.note,
        };
        match self.transactions.add(new) {
            Ok(id) => Ok(Ok(id)),
            Err(VaultError::Validation(reason)) => Ok(Err(reason)),
            Err(e) => Err(e),
        }
    }

    // ========== Export ==========

    /// Transactions matching `filter` in export shape, oldest first.
    pub fn export_rows(&self, filter: TransactionFilter) -> VaultResult<Vec<ExportRow>> {
        let names: HashMap<Uuid, String> = self
            .categories
            .list()?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();
        let mut rows: Vec<ExportRow> = self
            .transactions
            .list(filter)?
            .into_iter()
            .map(|tx| ExportRow {
                category: names
                    .get(&tx.category_id)
                    .cloned()
                    .unwrap_or_else(|| tx.category_id.to_string()),
                id: tx.id,
                date: tx.date,
                amount: tx.amount,
                note: tx.note,
                created_at: tx.created_at,
                modified_at: tx.modified_at,
            })
            .collect();
        rows.sort_by(|a, b| (a.date, a.created_at, a.id).cmp(&(b.date, b.created_at, b.id)));
        Ok(rows)
    }

    /// Write matching transactions as CSV. Returns the number of rows.
    pub fn export_csv<W: io::Write>(&self, output: W, filter: TransactionFilter) -> VaultResult<usize> {
        let rows = self.export_rows(filter)?;
        let mut writer = csv::Writer::from_writer(output);
        for row in &rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(rows.len())
    }

    pub fn export_json(&self, filter: TransactionFilter) -> VaultResult<String> {
        Ok(serde_json::to_string_pretty(&self.export_rows(filter)?)?)
    }
}

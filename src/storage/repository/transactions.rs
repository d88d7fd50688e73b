// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction repository.
//!
//! Every mutation is persisted before the call returns and invalidates the
//! spend cache entry of each (category, period) it touches.
//!
//! ## Validation
//!
//! - amount is non-zero, at most `max_amount` in magnitude, and its sign
//!   matches the category kind (expenses negative, income positive)
//! - category exists and belongs to the session user
//! - date is at most `future_tolerance_days` ahead and `max_past_years` back,
//!   checked on add and whenever an update moves it
//! - note is trimmed (empty becomes none), at most `max_note_len` characters

use chrono::{Days, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use super::{decode, encode, keys, CategoryRepository};
use crate::auth::{Session, UserIdentity};
use crate::config::ValidationRules;
use crate::error::{VaultError, VaultResult};
use crate::models::{
    AmountSign, NewTransaction, Period, Transaction, TransactionFilter, TransactionPatch,
};
use crate::storage::{
    EncryptedStore, OwnershipCheck, RecordScan, SpendCache, SpendKey, WriteBatch,
};

/// Lazy query result, decrypting one record at a time from a point-in-time
/// copy of the store.
pub struct TransactionQuery<'a> {
    scan: RecordScan<'a>,
    filter: TransactionFilter,
    user: UserIdentity,
}

impl Iterator for TransactionQuery<'_> {
    type Item = VaultResult<Transaction>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let decoded = match self.scan.next()? {
                Ok((_, bytes)) => decode::<Transaction>(&bytes).verify_owner(&self.user),
                Err(e) => Err(e),
            };
            match decoded {
                Ok(tx) if !self.filter.matches(&tx) => continue,
                other => return Some(other),
            }
        }
    }
}

/// Repository for transaction operations, scoped to one session.
pub struct TransactionRepository<'a> {
    store: &'a EncryptedStore,
    session: &'a Session,
    cache: &'a SpendCache,
    rules: &'a ValidationRules,
}

impl<'a> TransactionRepository<'a> {
    pub fn new(
        store: &'a EncryptedStore,
        session: &'a Session,
        cache: &'a SpendCache,
        rules: &'a ValidationRules,
    ) -> Self {
        Self {
            store,
            session,
            cache,
            rules,
        }
    }

    fn categories(&self) -> CategoryRepository<'a> {
        CategoryRepository::new(self.store, self.session, self.cache)
    }

    fn spend_key(&self, category_id: Uuid, period: Period) -> SpendKey {
        SpendKey::new(self.session.user_id(), category_id, period)
    }

    // ========== Validation ==========

    fn validate_date(&self, date: NaiveDate) -> VaultResult<()> {
        let today = Utc::now().date_naive();
        let latest = today
            .checked_add_days(Days::new(self.rules.future_tolerance_days.max(0) as u64))
            .unwrap_or(NaiveDate::MAX);
        if date > latest {
            return Err(VaultError::validation(format!(
                "date {date} is more than {} days in the future",
                self.rules.future_tolerance_days
            )));
        }
        let earliest = today
            .checked_sub_months(Months::new(12 * self.rules.max_past_years.max(0) as u32))
            .unwrap_or(NaiveDate::MIN);
        if date < earliest {
            return Err(VaultError::validation(format!(
                "date {date} is more than {} years in the past",
                self.rules.max_past_years
            )));
        }
        Ok(())
    }

    fn normalize_note(&self, note: Option<String>) -> VaultResult<Option<String>> {
        let Some(note) = note else {
            return Ok(None);
        };
        let trimmed = note.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        if trimmed.chars().count() > self.rules.max_note_len {
            return Err(VaultError::validation(format!(
                "note must be at most {} characters",
                self.rules.max_note_len
            )));
        }
        Ok(Some(trimmed.to_string()))
    }

    fn validate_amount(&self, amount: Decimal, category_id: Uuid) -> VaultResult<()> {
        if amount.is_zero() {
            return Err(VaultError::validation("amount must be non-zero"));
        }
        if amount.abs() > self.rules.max_amount {
            return Err(VaultError::validation(format!(
                "amount must not exceed {} in magnitude",
                self.rules.max_amount
            )));
        }

        let category = match self.categories().get(category_id) {
            Ok(category) => category,
            Err(VaultError::NotFound(_)) => {
                return Err(VaultError::validation(format!(
                    "category {category_id} does not exist"
                )))
            }
            Err(e) => return Err(e),
        };
        if !category.kind.accepts(amount) {
            return Err(VaultError::validation(format!(
                "amount sign does not match {:?} category '{}'",
                category.kind, category.name
            )));
        }
        Ok(())
    }

    // ========== CRUD ==========

    /// Validate and persist a new transaction, returning its id.
    pub fn add(&self, new: NewTransaction) -> VaultResult<Uuid> {
        self.validate_amount(new.amount, new.category_id)?;
        self.validate_date(new.date)?;
        let note = self.normalize_note(new.note)?;

        let now = Utc::now();
        let tx = Transaction {
            id: Uuid::new_v4(),
            owner_user_id: self.session.user_id().to_string(),
            amount: new.amount,
            category_id: new.category_id,
            date: new.date,
            note,
            created_at: now,
            modified_at: now,
        };

        self.store
            .put(self.session, &keys::transaction(tx.id), &encode(&tx)?)?;
        self.cache.invalidate(&self.spend_key(tx.category_id, tx.period()));

        debug!(tx_id = %tx.id, category_id = %tx.category_id, "Transaction added");
        Ok(tx.id)
    }

    /// Get a transaction by ID.
    pub fn get(&self, id: Uuid) -> VaultResult<Transaction> {
        self.store
            .get(self.session, &keys::transaction(id))
            .and_then(|bytes| decode::<Transaction>(&bytes))
            .verify_owner(self.session.identity())
    }

    /// Apply a partial update. The id never changes.
    pub fn update(&self, id: Uuid, patch: TransactionPatch) -> VaultResult<Transaction> {
        let existing = self.get(id)?;
        if patch.is_empty() {
            return Ok(existing);
        }

        let date_changed = patch.date.is_some_and(|date| date != existing.date);
        let mut updated = existing.clone();
        if let Some(amount) = patch.amount {
            updated.amount = amount;
        }
        if let Some(category_id) = patch.category_id {
            updated.category_id = category_id;
        }
        if let Some(date) = patch.date {
            updated.date = date;
        }
        if let Some(note) = patch.note {
            updated.note = note;
        }

        self.validate_amount(updated.amount, updated.category_id)?;
        if date_changed {
            self.validate_date(updated.date)?;
        }
        updated.note = self.normalize_note(updated.note)?;
        updated.modified_at = Utc::now();

        self.store
            .put(self.session, &keys::transaction(id), &encode(&updated)?)?;
        self.cache
            .invalidate(&self.spend_key(existing.category_id, existing.period()));
        self.cache
            .invalidate(&self.spend_key(updated.category_id, updated.period()));

        debug!(tx_id = %id, "Transaction updated");
        Ok(updated)
    }

    pub fn remove(&self, id: Uuid) -> VaultResult<()> {
        let existing = self.get(id)?;
        self.store.delete(self.session, &keys::transaction(id))?;
        self.cache
            .invalidate(&self.spend_key(existing.category_id, existing.period()));
        debug!(tx_id = %id, "Transaction removed");
        Ok(())
    }

    // ========== Queries ==========

    /// Lazily yield the session user's transactions matching `filter`.
    ///
    /// The result reflects the store at call time; writes made while
    /// iterating are not observed.
    pub fn query(&self, filter: TransactionFilter) -> VaultResult<TransactionQuery<'a>> {
        Ok(TransactionQuery {
            scan: self.store.scan(self.session, keys::TRANSACTION_PREFIX)?,
            filter,
            user: self.session.identity().clone(),
        })
    }

    /// Matching transactions, ordered by date then creation time.
    pub fn list(&self, filter: TransactionFilter) -> VaultResult<Vec<Transaction>> {
        let mut txs = self.query(filter)?.collect::<VaultResult<Vec<_>>>()?;
        txs.sort_by(|a, b| (a.date, a.created_at, a.id).cmp(&(b.date, b.created_at, b.id)));
        Ok(txs)
    }

    /// Amount spent in a category during a period: the negated sum of its
    /// transactions, floored at zero.
    pub fn spent(&self, category_id: Uuid, period: Period) -> VaultResult<Decimal> {
        let key = self.spend_key(category_id, period);
        if let Some(spent) = self.cache.get(&key) {
            return Ok(spent);
        }

        let mut total = Decimal::ZERO;
        for tx in self.query(TransactionFilter::all().in_period(period).category(category_id))? {
            total += tx?.amount;
        }
        let spent = (-total).max(Decimal::ZERO);
        self.cache.put(key, spent);
        Ok(spent)
    }

    /// Sum of positive transactions in a period.
    pub fn income(&self, period: Period) -> VaultResult<Decimal> {
        let mut total = Decimal::ZERO;
        for tx in self.query(TransactionFilter::all().in_period(period).sign(AmountSign::Income))? {
            total += tx?.amount;
        }
        Ok(total)
    }

    /// Months between the first transaction and `period`, inclusive. Zero
    /// when there is no history.
    pub fn months_of_history(&self, period: Period) -> VaultResult<u32> {
        let mut first: Option<NaiveDate> = None;
        for tx in self.query(TransactionFilter::all())? {
            let date = tx?.date;
            first = Some(first.map_or(date, |f| f.min(date)));
        }
        Ok(first.map_or(0, |f| {
            let start = Period::of(f);
            (start.months_until(period) + 1).max(0) as u32
        }))
    }

    /// Remove every transaction of the session user. Used by tests and
    /// account resets.
    pub fn clear(&self) -> VaultResult<usize> {
        let ids: Vec<Uuid> = self
            .query(TransactionFilter::all())?
            .map(|tx| tx.map(|tx| tx.id))
            .collect::<VaultResult<_>>()?;
        let mut batch = WriteBatch::new();
        for id in &ids {
            batch.delete(keys::transaction(*id));
        }
        self.store.apply(self.session, batch)?;
        self.cache.invalidate_user(self.session.user_id());
        info!(count = ids.len(), "Transactions cleared");
        Ok(ids.len())
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Category repository.
//!
//! Names are unique per user within a kind, compared case-insensitively.
//! A category still referenced by transactions or budgets cannot be deleted
//! unless the caller names a reassignment target.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{decode, encode, keys};
use crate::auth::Session;
use crate::error::{VaultError, VaultResult};
use crate::models::{Budget, BudgetBucket, Category, CategoryKind, NewCategory, Transaction};
use crate::storage::{EncryptedStore, OwnershipCheck, SpendCache, WriteBatch};

/// Expense categories created by [`CategoryRepository::seed_defaults`].
pub const DEFAULT_EXPENSE_CATEGORIES: [&str; 13] = [
    "Food",
    "Transport",
    "Health",
    "Education",
    "Housing",
    "Entertainment",
    "Savings",
    "Shopping",
    "Travel",
    "Gifts",
    "Utilities",
    "Insurance",
    "Other",
];

/// Income category created by [`CategoryRepository::seed_defaults`].
pub const DEFAULT_INCOME_CATEGORY: &str = "Income";

const MAX_NAME_LEN: usize = 50;

/// What a successful deletion changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryDeletion {
    pub transactions_moved: usize,
    pub budgets_moved: usize,
    /// Budgets dropped because the target already had one for that period.
    pub budgets_dropped: usize,
}

/// Repository for category operations, scoped to one session.
pub struct CategoryRepository<'a> {
    store: &'a EncryptedStore,
    session: &'a Session,
    cache: &'a SpendCache,
}

impl<'a> CategoryRepository<'a> {
    pub fn new(store: &'a EncryptedStore, session: &'a Session, cache: &'a SpendCache) -> Self {
        Self {
            store,
            session,
            cache,
        }
    }

    fn normalize_name(name: &str) -> VaultResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(VaultError::validation("category name must not be empty"));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(VaultError::validation(format!(
                "category name must be at most {MAX_NAME_LEN} characters"
            )));
        }
        Ok(name.to_string())
    }

    fn ensure_unique(&self, name: &str, kind: CategoryKind, except: Option<Uuid>) -> VaultResult<()> {
        let clash = self.list()?.into_iter().any(|c| {
            c.kind == kind && c.name.eq_ignore_ascii_case(name) && Some(c.id) != except
        });
        if clash {
            return Err(VaultError::validation(format!(
                "a category named '{name}' already exists"
            )));
        }
        Ok(())
    }

    /// Create a category.
    pub fn create(&self, new: NewCategory) -> VaultResult<Category> {
        let name = Self::normalize_name(&new.name)?;
        self.ensure_unique(&name, new.kind, None)?;

        let category = Category {
            id: Uuid::new_v4(),
            owner_user_id: self.session.user_id().to_string(),
            bucket: new.bucket.unwrap_or_else(|| BudgetBucket::infer(&name)),
            name,
            kind: new.kind,
            created_at: Utc::now(),
        };
        self.store
            .put(self.session, &keys::category(category.id), &encode(&category)?)?;
        info!(category_id = %category.id, name = %category.name, "Category created");
        Ok(category)
    }

    /// Get a category by ID.
    pub fn get(&self, id: Uuid) -> VaultResult<Category> {
        self.store
            .get(self.session, &keys::category(id))
            .and_then(|bytes| decode::<Category>(&bytes))
            .verify_owner(self.session.identity())
    }

    /// All categories of the session user, expenses first, then by name.
    pub fn list(&self) -> VaultResult<Vec<Category>> {
        let mut categories = self
            .store
            .scan(self.session, keys::CATEGORY_PREFIX)?
            .map(|item| item.and_then(|(_, bytes)| decode::<Category>(&bytes)))
            .collect::<VaultResult<Vec<_>>>()?;
        categories.sort_by(|a, b| {
            (a.kind == CategoryKind::Income, a.name.to_lowercase())
                .cmp(&(b.kind == CategoryKind::Income, b.name.to_lowercase()))
        });
        Ok(categories)
    }

    /// Case-insensitive lookup by name, optionally restricted to one kind.
    pub fn find_by_name(&self, name: &str, kind: Option<CategoryKind>) -> VaultResult<Option<Category>> {
        let name = name.trim();
        Ok(self
            .list()?
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(name) && kind.is_none_or(|k| c.kind == k)))
    }

    pub fn rename(&self, id: Uuid, name: &str) -> VaultResult<Category> {
        let mut category = self.get(id)?;
        let name = Self::normalize_name(name)?;
        self.ensure_unique(&name, category.kind, Some(id))?;
        category.name = name;
        self.store
            .put(self.session, &keys::category(id), &encode(&category)?)?;
        Ok(category)
    }

    pub fn set_bucket(&self, id: Uuid, bucket: BudgetBucket) -> VaultResult<Category> {
        let mut category = self.get(id)?;
        category.bucket = bucket;
        self.store
            .put(self.session, &keys::category(id), &encode(&category)?)?;
        Ok(category)
    }

    /// Create the default categories that do not exist yet, in one batch.
    pub fn seed_defaults(&self) -> VaultResult<Vec<Category>> {
        let existing = self.list()?;
        let has = |name: &str, kind: CategoryKind| {
            existing
                .iter()
                .any(|c| c.kind == kind && c.name.eq_ignore_ascii_case(name))
        };

        let wanted = DEFAULT_EXPENSE_CATEGORIES
            .iter()
            .map(|name| NewCategory::expense(*name))
            .chain(std::iter::once(NewCategory::income(DEFAULT_INCOME_CATEGORY)));

        let now = Utc::now();
        let mut batch = WriteBatch::new();
        let mut created = Vec::new();
        for new in wanted {
            if has(&new.name, new.kind) {
                continue;
            }
            let category = Category {
                id: Uuid::new_v4(),
                owner_user_id: self.session.user_id().to_string(),
                bucket: BudgetBucket::infer(&new.name),
                name: new.name,
                kind: new.kind,
                created_at: now,
            };
            batch.put(keys::category(category.id), encode(&category)?);
            created.push(category);
        }

        self.store.apply(self.session, batch)?;
        if !created.is_empty() {
            info!(count = created.len(), "Seeded default categories");
        }
        Ok(created)
    }

    /// Delete a category.
    ///
    /// If transactions or budgets still reference it, `reassign_to` must name
    /// another category of the same kind; otherwise the call fails with
    /// `Forbidden` and nothing changes. With a target, transactions move to
    /// it; budgets move too unless the target already has a budget for that
    /// period, in which case the target's budget wins.
    pub fn delete(&self, id: Uuid, reassign_to: Option<Uuid>) -> VaultResult<CategoryDeletion> {
        let category = self.get(id)?;

        let transactions: Vec<Transaction> = self
            .store
            .scan(self.session, keys::TRANSACTION_PREFIX)?
            .map(|item| item.and_then(|(_, bytes)| decode::<Transaction>(&bytes)))
            .filter(|tx| tx.as_ref().map_or(true, |tx| tx.category_id == id))
            .collect::<VaultResult<_>>()?;
        let budgets: Vec<Budget> = self
            .store
            .scan(self.session, &keys::budgets_of(id))?
            .map(|item| item.and_then(|(_, bytes)| decode::<Budget>(&bytes)))
            .collect::<VaultResult<_>>()?;

        let mut outcome = CategoryDeletion::default();
        let mut batch = WriteBatch::new();

        if !transactions.is_empty() || !budgets.is_empty() {
            let target_id = reassign_to.ok_or_else(|| {
                VaultError::forbidden(format!(
                    "category '{}' is used by {} transactions and {} budgets; \
                     supply a reassignment target",
                    category.name,
                    transactions.len(),
                    budgets.len()
                ))
            })?;
            if target_id == id {
                return Err(VaultError::validation(
                    "reassignment target must be a different category",
                ));
            }
            let target = self.get(target_id)?;
            if target.kind != category.kind {
                return Err(VaultError::validation(
                    "reassignment target must be of the same kind",
                ));
            }

            let now = Utc::now();
            for mut tx in transactions {
                tx.category_id = target_id;
                tx.modified_at = now;
                batch.put(keys::transaction(tx.id), encode(&tx)?);
                outcome.transactions_moved += 1;
            }
            for mut budget in budgets {
                batch.delete(keys::budget(id, budget.period));
                let target_key = keys::budget(target_id, budget.period);
                if self.store.contains(self.session, &target_key)? {
                    warn!(
                        period = %budget.period,
                        category_id = %id,
                        "Dropping budget of deleted category; target already budgeted"
                    );
                    outcome.budgets_dropped += 1;
                } else {
                    budget.category_id = target_id;
                    budget.updated_at = now;
                    batch.put(target_key, encode(&budget)?);
                    outcome.budgets_moved += 1;
                }
            }
            self.cache
                .invalidate_category(self.session.user_id(), target_id);
        }

        batch.delete(keys::category(id));
        self.store.apply(self.session, batch)?;
        self.cache.invalidate_category(self.session.user_id(), id);

        info!(
            category_id = %id,
            transactions_moved = outcome.transactions_moved,
            budgets_moved = outcome.budgets_moved,
            budgets_dropped = outcome.budgets_dropped,
            "Category deleted"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BudgetStrategy, NewTransaction, Period, TransactionFilter};
    use crate::test_support::{dec, last_month, login, test_vault};

    #[test]
    fn create_and_list_categories() {
        let (_dir, vault) = test_vault();
        let session = login(&vault, "alice");
        let repo = vault.categories(&session);

        let food = repo.create(NewCategory::expense("  Food ")).unwrap();
        assert_eq!(food.name, "Food");
        assert_eq!(food.bucket, BudgetBucket::Needs);
        repo.create(NewCategory::income("Salary")).unwrap();
        repo.create(NewCategory::expense("Cinema")).unwrap();

        let names: Vec<String> = repo.list().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Cinema", "Food", "Salary"]);
        assert_eq!(repo.get(food.id).unwrap(), food);
    }

    #[test]
    fn names_unique_per_kind() {
        let (_dir, vault) = test_vault();
        let session = login(&vault, "alice");
        let repo = vault.categories(&session);

        repo.create(NewCategory::expense("Gifts")).unwrap();
        assert!(matches!(
            repo.create(NewCategory::expense("gifts")),
            Err(VaultError::Validation(_))
        ));
        // Same name under the other kind is fine.
        repo.create(NewCategory::income("Gifts")).unwrap();
        assert!(matches!(
            repo.create(NewCategory::expense("   ")),
            Err(VaultError::Validation(_))
        ));
    }

    #[test]
    fn seed_defaults_is_idempotent() {
        let (_dir, vault) = test_vault();
        let session = login(&vault, "alice");
        let repo = vault.categories(&session);

        let first = repo.seed_defaults().unwrap();
        assert_eq!(first.len(), DEFAULT_EXPENSE_CATEGORIES.len() + 1);
        assert!(repo.seed_defaults().unwrap().is_empty());
        let savings = repo
            .find_by_name("savings", Some(CategoryKind::Expense))
            .unwrap()
            .unwrap();
        assert_eq!(savings.bucket, BudgetBucket::Savings);
    }

    #[test]
    fn other_users_category_is_forbidden() {
        let (_dir, vault) = test_vault();
        let alice = login(&vault, "alice");
        let bob = login(&vault, "bob");
        let food = vault
            .categories(&alice)
            .create(NewCategory::expense("Food"))
            .unwrap();

        assert!(matches!(
            vault.categories(&bob).get(food.id),
            Err(VaultError::Forbidden(_))
        ));
        assert!(vault.categories(&bob).list().unwrap().is_empty());
    }

    #[test]
    fn deleting_used_category_requires_reassignment() {
        let (_dir, vault) = test_vault();
        let session = login(&vault, "alice");
        let categories = vault.categories(&session);
        let food = categories.create(NewCategory::expense("Food")).unwrap();
        let groceries = categories.create(NewCategory::expense("Groceries")).unwrap();
        let salary = categories.create(NewCategory::income("Salary")).unwrap();

        let period = last_month();
        let tx_id = vault
            .transactions(&session)
            .add(NewTransaction {
                amount: dec("-25.00"),
                category_id: food.id,
                date: period.first_day(),
                note: Some("market".into()),
            })
            .unwrap();

        let err = categories.delete(food.id, None).unwrap_err();
        assert!(matches!(err, VaultError::Forbidden(_)));
        // Nothing was orphaned.
        assert_eq!(categories.get(food.id).unwrap().name, "Food");
        assert_eq!(
            vault.transactions(&session).get(tx_id).unwrap().category_id,
            food.id
        );

        assert!(matches!(
            categories.delete(food.id, Some(salary.id)),
            Err(VaultError::Validation(_))
        ));

        let outcome = categories.delete(food.id, Some(groceries.id)).unwrap();
        assert_eq!(outcome.transactions_moved, 1);
        assert!(matches!(categories.get(food.id), Err(VaultError::NotFound(_))));
        let moved = vault
            .transactions(&session)
            .list(TransactionFilter::all().category(groceries.id))
            .unwrap();
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].id, tx_id);
    }

    #[test]
    fn reassignment_moves_or_drops_budgets() {
        let (_dir, vault) = test_vault();
        let session = login(&vault, "alice");
        let categories = vault.categories(&session);
        let old = categories.create(NewCategory::expense("Dining")).unwrap();
        let new = categories.create(NewCategory::expense("Restaurants")).unwrap();

        let this = last_month();
        let prior: Period = this.prev();
        let budgets = vault.budgets(&session);
        budgets
            .set_budget(old.id, this, dec("100"), BudgetStrategy::Manual)
            .unwrap();
        budgets
            .set_budget(old.id, prior, dec("80"), BudgetStrategy::Manual)
            .unwrap();
        budgets
            .set_budget(new.id, this, dec("150"), BudgetStrategy::Manual)
            .unwrap();

        let outcome = categories.delete(old.id, Some(new.id)).unwrap();
        assert_eq!(outcome.budgets_moved, 1);
        assert_eq!(outcome.budgets_dropped, 1);

        assert_eq!(budgets.budget(new.id, this).unwrap().unwrap().limit, dec("150"));
        assert_eq!(budgets.budget(new.id, prior).unwrap().unwrap().limit, dec("80"));
    }

    #[test]
    fn unused_category_deletes_without_target() {
        let (_dir, vault) = test_vault();
        let session = login(&vault, "alice");
        let categories = vault.categories(&session);
        let travel = categories.create(NewCategory::expense("Travel")).unwrap();

        assert_eq!(
            categories.delete(travel.id, None).unwrap(),
            CategoryDeletion::default()
        );
        assert!(categories.list().unwrap().is_empty());
    }
}

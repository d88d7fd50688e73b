// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared vault state.
//!
//! [`Vault`] owns the opened store, the utilization cache and the config.
//! Everything user-scoped is reached through a [`Session`]:
//!
//! ```text
//! AuthGate -> UserIdentity -> Vault::start_session -> Session
//!          -> vault.transactions(&session) / budgets / insights ...
//! ```

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use crate::auth::{AuthGate, Credentials, LocalAuthGate, Session, UserIdentity};
use crate::budget::BudgetEngine;
use crate::config::VaultConfig;
use crate::error::VaultResult;
use crate::import_export::ImportExport;
use crate::insight::{InsightPipeline, InsightSnapshot};
use crate::storage::{
    BackupRotator, BackupSnapshot, BudgetRepository, CategoryRepository, EncryptedStore,
    ProfileRepository, SpendCache, StoragePaths, TransactionRepository,
};

pub struct Vault {
    config: VaultConfig,
    store: Arc<EncryptedStore>,
    cache: SpendCache,
}

impl Vault {
    /// Open (or create) the store under `config.data_dir`.
    pub fn open(config: VaultConfig) -> VaultResult<Self> {
        let store = EncryptedStore::open(
            StoragePaths::new(&config.data_dir),
            config.backup_retention,
            config.snapshot_on_write,
        )?;
        info!(data_dir = %config.data_dir.display(), "Vault opened");
        Ok(Self {
            cache: SpendCache::new(config.spend_cache_capacity),
            store: Arc::new(store),
            config,
        })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &EncryptedStore {
        &self.store
    }

    /// The bundled gate over this vault's account registry.
    pub fn auth_gate(&self) -> LocalAuthGate {
        LocalAuthGate::with_kdf(Arc::clone(&self.store), self.config.kdf.clone())
    }

    // ========== Sessions ==========

    /// Open a session for an identity returned by an AuthGate. The password
    /// is needed once more to derive the store key.
    pub fn start_session(
        &self,
        identity: UserIdentity,
        credentials: &Credentials,
    ) -> VaultResult<Session> {
        self.store.unlock(
            identity,
            credentials.password().as_bytes(),
            self.config.idle_timeout,
        )
    }

    /// Authenticate through `gate` and open a session.
    pub fn login(&self, gate: &impl AuthGate, credentials: &Credentials) -> VaultResult<Session> {
        let identity = gate.authenticate(credentials)?;
        self.start_session(identity, credentials)
    }

    /// Evict the session key.
    pub fn logout(&self, session: Session) {
        session.end();
    }

    /// Delete the session user's account with all their records.
    pub fn remove_account(&self, session: &Session) -> VaultResult<usize> {
        let removed = self.store.remove_account(session)?;
        self.cache.invalidate_user(session.user_id());
        Ok(removed)
    }

    // ========== Repositories ==========

    pub fn categories<'a>(&'a self, session: &'a Session) -> CategoryRepository<'a> {
        CategoryRepository::new(&self.store, session, &self.cache)
    }

    pub fn transactions<'a>(&'a self, session: &'a Session) -> TransactionRepository<'a> {
        TransactionRepository::new(&self.store, session, &self.cache, &self.config.rules)
    }

    pub fn budgets<'a>(&'a self, session: &'a Session) -> BudgetEngine<'a> {
        BudgetEngine::new(
            self.transactions(session),
            self.categories(session),
            BudgetRepository::new(&self.store, session),
            self.config.insight.history_months,
        )
    }

    pub fn profiles<'a>(&'a self, session: &'a Session) -> ProfileRepository<'a> {
        ProfileRepository::new(&self.store, session)
    }

    pub fn import_export<'a>(&'a self, session: &'a Session) -> ImportExport<'a> {
        ImportExport::new(self.categories(session), self.transactions(session))
    }

    /// Capture the session user's data as of `as_of` and return a pipeline
    /// over that snapshot. Later writes do not affect it.
    pub fn insights(&self, session: &Session, as_of: NaiveDate) -> VaultResult<InsightPipeline> {
        let snapshot = InsightSnapshot::capture(
            &self.transactions(session),
            &self.categories(session),
            &BudgetRepository::new(&self.store, session),
            as_of,
        )?;
        Ok(InsightPipeline::new(snapshot, self.config.insight.clone()))
    }

    // ========== Backups ==========

    pub fn snapshot(&self) -> VaultResult<BackupSnapshot> {
        self.store.snapshot()
    }

    pub fn list_snapshots(&self) -> VaultResult<Vec<BackupSnapshot>> {
        self.store.list_snapshots()
    }

    pub fn verify_snapshot(&self, session: &Session, snapshot: &BackupSnapshot) -> VaultResult<usize> {
        self.store.verify_snapshot(session, snapshot)
    }

    /// Restore a snapshot. Cached utilization is dropped.
    pub fn restore(&self, session: &Session, snapshot: &BackupSnapshot) -> VaultResult<()> {
        self.store.restore(session, snapshot)?;
        self.cache.clear();
        Ok(())
    }

    /// Background rotator over this vault's store.
    pub fn rotator(&self) -> BackupRotator {
        BackupRotator::new(Arc::clone(&self.store), self.config.rotation_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VaultError;
    use crate::models::{NewCategory, NewTransaction, TransactionFilter};
    use crate::test_support::{dec, last_month, login, test_vault};

    #[test]
    fn login_through_gate() {
        let (_dir, vault) = test_vault();
        let gate = vault.auth_gate();
        gate.register("alice", "password123").unwrap();

        let session = vault
            .login(&gate, &Credentials::new("alice", "password123"))
            .unwrap();
        assert_eq!(session.identity().username, "alice");

        assert!(matches!(
            vault.login(&gate, &Credentials::new("alice", "nope-nope")),
            Err(VaultError::Forbidden(_))
        ));
    }

    #[test]
    fn logout_evicts_key() {
        let (_dir, vault) = test_vault();
        let session = login(&vault, "alice");
        session.end();
        assert!(matches!(
            vault.categories(&session).list(),
            Err(VaultError::Reauthenticate)
        ));
    }

    #[test]
    fn restore_recomputes_utilization() {
        let (_dir, vault) = test_vault();
        let session = login(&vault, "alice");
        let food = vault.categories(&session).create(NewCategory::expense("Food")).unwrap();
        let period = last_month();
        let txs = vault.transactions(&session);
        txs.add(NewTransaction {
            amount: dec("-30"),
            category_id: food.id,
            date: period.day(3),
            note: None,
        })
        .unwrap();
        let snap = vault.snapshot().unwrap();

        txs.add(NewTransaction {
            amount: dec("-50"),
            category_id: food.id,
            date: period.day(4),
            note: None,
        })
        .unwrap();
        assert_eq!(txs.spent(food.id, period).unwrap(), dec("80"));

        vault.restore(&session, &snap).unwrap();
        assert_eq!(txs.spent(food.id, period).unwrap(), dec("30"));
        assert_eq!(txs.list(TransactionFilter::all()).unwrap().len(), 1);
    }

    #[test]
    fn removed_account_cannot_log_in() {
        let (_dir, vault) = test_vault();
        let session = login(&vault, "alice");
        vault.categories(&session).seed_defaults().unwrap();

        assert_eq!(vault.remove_account(&session).unwrap(), 14);
        let gate = vault.auth_gate();
        assert!(vault
            .login(&gate, &Credentials::new("alice", "password123"))
            .is_err());
    }
}

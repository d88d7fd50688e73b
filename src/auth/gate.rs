// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! AuthGate contract and the bundled local implementation.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{AuthFailure, Credentials, UserIdentity};
use crate::crypto::{derive_key, hash_password, verify_password, KdfParams};
use crate::error::{VaultError, VaultResult};
use crate::storage::{seal_key_check, AccountRecord, EncryptedStore};

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 8;

/// Supplies verified identities. The core trusts a returned
/// [`UserIdentity`] and never re-checks the credentials itself.
pub trait AuthGate {
    fn authenticate(&self, credentials: &Credentials) -> Result<UserIdentity, AuthFailure>;
}

/// Gate backed by the account registry inside the store file.
pub struct LocalAuthGate {
    store: Arc<EncryptedStore>,
    kdf: KdfParams,
}

impl LocalAuthGate {
    pub fn new(store: Arc<EncryptedStore>) -> Self {
        Self::with_kdf(store, KdfParams::default())
    }

    /// Use custom Argon2id cost settings for new accounts.
    pub fn with_kdf(store: Arc<EncryptedStore>, kdf: KdfParams) -> Self {
        Self { store, kdf }
    }

    /// Create an account.
    ///
    /// The password hash and the key-derivation salt are independent; the
    /// store key itself is never persisted, only a sealed key check.
    pub fn register(&self, username: &str, password: &str) -> VaultResult<UserIdentity> {
        let username = username.trim();
        if username.chars().count() < MIN_USERNAME_LEN {
            return Err(VaultError::validation(format!(
                "username must be at least {MIN_USERNAME_LEN} characters"
            )));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(VaultError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let user_id = Uuid::new_v4().to_string();
        let password_hash = hash_password(password.as_bytes(), &self.kdf.with_fresh_salt())?;
        let kdf = self.kdf.with_fresh_salt();
        let key = derive_key(password.as_bytes(), &kdf)?;
        let key_check = seal_key_check(&key, &user_id)?;

        self.store.insert_account(AccountRecord {
            user_id: user_id.clone(),
            username: username.to_string(),
            password_hash,
            kdf,
            key_check,
            created_at: Utc::now(),
        })?;

        Ok(UserIdentity {
            user_id,
            username: username.to_string(),
        })
    }
}

impl AuthGate for LocalAuthGate {
    fn authenticate(&self, credentials: &Credentials) -> Result<UserIdentity, AuthFailure> {
        let account = self
            .store
            .account_by_username(credentials.username().trim())
            .map_err(|e| AuthFailure::Unavailable(e.to_string()))?;

        let Some(account) = account else {
            warn!("Login attempt for unknown username");
            return Err(AuthFailure::InvalidCredentials);
        };

        let valid = verify_password(credentials.password().as_bytes(), &account.password_hash)
            .map_err(|e| AuthFailure::Unavailable(e.to_string()))?;
        if !valid {
            warn!(user_id = %account.user_id, "Login attempt with wrong password");
            return Err(AuthFailure::InvalidCredentials);
        }

        info!(user_id = %account.user_id, "User authenticated");
        Ok(UserIdentity {
            user_id: account.user_id,
            username: account.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use crate::test_support::fast_kdf;

    fn test_gate() -> (tempfile::TempDir, LocalAuthGate) {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedStore::open(StoragePaths::new(dir.path()), 5, false).unwrap();
        (dir, LocalAuthGate::with_kdf(Arc::new(store), fast_kdf()))
    }

    #[test]
    fn register_then_authenticate() {
        let (_dir, gate) = test_gate();
        let registered = gate.register("  alice ", "correct horse").unwrap();
        assert_eq!(registered.username, "alice");

        let identity = gate
            .authenticate(&Credentials::new("alice", "correct horse"))
            .unwrap();
        assert_eq!(identity, registered);
    }

    #[test]
    fn wrong_password_and_unknown_user_look_the_same() {
        let (_dir, gate) = test_gate();
        gate.register("alice", "correct horse").unwrap();

        assert_eq!(
            gate.authenticate(&Credentials::new("alice", "wrong horse")),
            Err(AuthFailure::InvalidCredentials)
        );
        assert_eq!(
            gate.authenticate(&Credentials::new("mallory", "correct horse")),
            Err(AuthFailure::InvalidCredentials)
        );
    }

    #[test]
    fn registration_rules() {
        let (_dir, gate) = test_gate();
        assert!(matches!(
            gate.register("al", "long enough"),
            Err(VaultError::Validation(_))
        ));
        assert!(matches!(
            gate.register("alice", "short"),
            Err(VaultError::Validation(_))
        ));
        gate.register("alice", "long enough").unwrap();
        assert!(matches!(
            gate.register("ALICE", "long enough"),
            Err(VaultError::Validation(_))
        ));
    }
}

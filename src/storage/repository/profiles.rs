// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User profile repository (display name and base currency).

use chrono::Utc;

use super::{decode, encode, keys};
use crate::auth::Session;
use crate::error::{VaultError, VaultResult};
use crate::models::UserProfile;
use crate::storage::{EncryptedStore, OwnershipCheck};

const MAX_DISPLAY_NAME_LEN: usize = 100;

pub struct ProfileRepository<'a> {
    store: &'a EncryptedStore,
    session: &'a Session,
}

impl<'a> ProfileRepository<'a> {
    pub fn new(store: &'a EncryptedStore, session: &'a Session) -> Self {
        Self { store, session }
    }

    pub fn get(&self) -> VaultResult<Option<UserProfile>> {
        match self
            .store
            .get(self.session, &keys::profile(self.session.user_id()))
            .and_then(|bytes| decode::<UserProfile>(&bytes))
            .verify_owner(self.session.identity())
        {
            Ok(profile) => Ok(Some(profile)),
            Err(VaultError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create or update the profile. `base_currency` must be a three-letter
    /// ISO 4217 code; it is stored upper-cased.
    pub fn upsert(&self, display_name: &str, base_currency: &str) -> VaultResult<UserProfile> {
        let display_name = display_name.trim();
        if display_name.is_empty() || display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
            return Err(VaultError::validation(format!(
                "display name must be 1-{MAX_DISPLAY_NAME_LEN} characters"
            )));
        }
        let currency = base_currency.trim().to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(VaultError::validation(format!(
                "'{base_currency}' is not a three-letter currency code"
            )));
        }

        let now = Utc::now();
        let profile = match self.get()? {
            Some(mut existing) => {
                existing.display_name = display_name.to_string();
                existing.base_currency = currency;
                existing.updated_at = now;
                existing
            }
            None => UserProfile {
                user_id: self.session.user_id().to_string(),
                display_name: display_name.to_string(),
                base_currency: currency,
                created_at: now,
                updated_at: now,
            },
        };
        self.store.put(
            self.session,
            &keys::profile(self.session.user_id()),
            &encode(&profile)?,
        )?;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{login, test_vault};

    #[test]
    fn upsert_creates_then_updates() {
        let (_dir, vault) = test_vault();
        let session = login(&vault, "alice");
        let repo = vault.profiles(&session);

        assert!(repo.get().unwrap().is_none());
        let created = repo.upsert("Alice", "eur").unwrap();
        assert_eq!(created.base_currency, "EUR");

        let updated = repo.upsert("Alice L.", "USD").unwrap();
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(repo.get().unwrap().unwrap().display_name, "Alice L.");
    }

    #[test]
    fn rejects_bad_currency_and_name() {
        let (_dir, vault) = test_vault();
        let session = login(&vault, "alice");
        let repo = vault.profiles(&session);

        assert!(matches!(repo.upsert("Alice", "EURO"), Err(VaultError::Validation(_))));
        assert!(matches!(repo.upsert("Alice", "E1R"), Err(VaultError::Validation(_))));
        assert!(matches!(repo.upsert("  ", "EUR"), Err(VaultError::Validation(_))));
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ownership enforcement for decoded records.
//!
//! The store already refuses sealed records owned by someone else; these
//! traits re-check the owner embedded in the decoded record itself.

use crate::auth::UserIdentity;
use crate::error::{VaultError, VaultResult};

/// Trait for resources that have an owner.
pub trait OwnedResource {
    /// Get the owner's user ID.
    fn owner_user_id(&self) -> &str;
}

/// Trait for enforcing ownership on repository operations.
pub trait OwnershipEnforcer {
    /// Verify that the user owns this resource.
    ///
    /// # Errors
    /// Returns `VaultError::Forbidden` if the user doesn't own the resource.
    fn verify_ownership(&self, user: &UserIdentity) -> VaultResult<()>;
}

impl<T: OwnedResource> OwnershipEnforcer for T {
    fn verify_ownership(&self, user: &UserIdentity) -> VaultResult<()> {
        if self.owner_user_id() == user.user_id {
            Ok(())
        } else {
            Err(VaultError::forbidden(format!(
                "user {} cannot access this resource",
                user.user_id
            )))
        }
    }
}

/// Verify ownership on a lookup result and pass the resource through.
pub trait OwnershipCheck<T> {
    fn verify_owner(self, user: &UserIdentity) -> VaultResult<T>;
}

impl<T: OwnedResource> OwnershipCheck<T> for VaultResult<T> {
    fn verify_owner(self, user: &UserIdentity) -> VaultResult<T> {
        let resource = self?;
        resource.verify_ownership(user)?;
        Ok(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestResource {
        owner: String,
    }

    impl OwnedResource for TestResource {
        fn owner_user_id(&self) -> &str {
            &self.owner
        }
    }

    fn make_user(user_id: &str) -> UserIdentity {
        UserIdentity {
            user_id: user_id.to_string(),
            username: format!("name-{user_id}"),
        }
    }

    #[test]
    fn ownership_verification_passes_for_owner() {
        let resource = TestResource {
            owner: "user_123".to_string(),
        };
        assert!(resource.verify_ownership(&make_user("user_123")).is_ok());
    }

    #[test]
    fn ownership_verification_fails_for_non_owner() {
        let resource = TestResource {
            owner: "user_123".to_string(),
        };
        let result = resource.verify_ownership(&make_user("user_456"));
        assert!(matches!(result, Err(VaultError::Forbidden(_))));
    }

    #[test]
    fn verify_owner_passes_errors_through() {
        let missing: VaultResult<TestResource> = Err(VaultError::not_found("tx/1"));
        assert!(matches!(
            missing.verify_owner(&make_user("user_123")),
            Err(VaultError::NotFound(_))
        ));

        let found: VaultResult<TestResource> = Ok(TestResource {
            owner: "user_123".to_string(),
        });
        assert!(found.verify_owner(&make_user("user_123")).is_ok());
    }
}

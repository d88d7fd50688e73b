// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential hashing for the account registry (Argon2id PHC strings).

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

use super::{CryptoError, CryptoResult, KdfParams};

/// Hash a password into a self-describing PHC string.
///
/// Only the cost settings of `params` are used; the PHC salt is generated
/// independently of the store-key salt.
pub fn hash_password(password: &[u8], params: &KdfParams) -> CryptoResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = params
        .argon2()?
        .hash_password(password, &salt)
        .map_err(|e| CryptoError::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC string.
///
/// Returns `Ok(false)` on a mismatch and an error only when the stored hash
/// itself is unusable.
pub fn verify_password(password: &[u8], phc: &str) -> CryptoResult<bool> {
    let parsed =
        PasswordHash::new(phc).map_err(|e| CryptoError::Malformed(format!("password hash: {e}")))?;
    match argon2::Argon2::default().verify_password(password, &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(CryptoError::PasswordHash(e.to_string())),
    }
}

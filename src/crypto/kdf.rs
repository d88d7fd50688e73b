// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Argon2id key derivation for store keys.
//!
//! Default parameters:
//! - Memory cost: 64 MiB (65,536 KiB)
//! - Time cost: 3 passes
//! - Parallelism: 1 lane
//! - Output length: 32 bytes
//! - Salt length: 16 bytes, random per user

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};

use super::{CryptoError, CryptoResult, StoreKey};

/// Argon2id parameters stored next to each account so the key can be
/// re-derived even after defaults change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Per-user random salt.
    pub salt: [u8; 16],
    /// Memory cost in KiB.
    pub mem_cost: u32,
    /// Number of passes.
    pub time_cost: u32,
    /// Number of lanes.
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            salt: rand::random(),
            mem_cost: 65_536,
            time_cost: 3,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Same cost settings with a freshly generated salt.
    pub fn with_fresh_salt(&self) -> Self {
        Self {
            salt: rand::random(),
            ..self.clone()
        }
    }

    /// Verify that parameters are acceptable to Argon2id.
    pub fn validate(&self) -> CryptoResult<()> {
        if self.parallelism < 1 {
            return Err(CryptoError::KdfFailed(
                "parallelism must be at least 1".to_string(),
            ));
        }
        if self.time_cost < 1 {
            return Err(CryptoError::KdfFailed(
                "time cost must be at least 1".to_string(),
            ));
        }
        if self.mem_cost < 8 * self.parallelism {
            return Err(CryptoError::KdfFailed(format!(
                "memory cost must be at least {} KiB",
                8 * self.parallelism
            )));
        }
        Ok(())
    }

    pub(crate) fn argon2(&self) -> CryptoResult<Argon2<'static>> {
        self.validate()?;
        let params = Params::new(
            self.mem_cost,
            self.time_cost,
            self.parallelism,
            Some(StoreKey::LEN),
        )
        .map_err(|e| CryptoError::KdfFailed(format!("invalid parameters: {e}")))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Derive a 256-bit store key from a password.
///
/// Same password and params always yield the same key; the key is never
/// persisted.
pub fn derive_key(password: &[u8], params: &KdfParams) -> CryptoResult<StoreKey> {
    let argon2 = params.argon2()?;
    let mut out = [0u8; StoreKey::LEN];
    argon2
        .hash_password_into(password, &params.salt, &mut out)
        .map_err(|e| CryptoError::KdfFailed(e.to_string()))?;
    Ok(StoreKey::from_bytes(out))
}

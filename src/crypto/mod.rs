// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cryptographic primitives for the encrypted store.
//!
//! This module provides:
//! - Argon2id key derivation from the user's password
//! - Argon2id credential hashing (PHC strings) for the account registry
//! - AES-256-GCM sealing of individual store records
//!
//! Nothing in here touches the filesystem; [`crate::storage`] owns layout
//! and persistence.

pub mod cipher;
pub mod kdf;
pub mod password;

pub use cipher::{open, seal, SealedBlob, StoreKey};
pub use kdf::{derive_key, KdfParams};
pub use password::{hash_password, verify_password};

use thiserror::Error;

/// Errors that can occur in cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("key derivation failed: {0}")]
    KdfFailed(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("authentication failed - data may have been tampered with or the key is wrong")]
    AuthenticationFailed,

    #[error("malformed sealed data: {0}")]
    Malformed(String),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

/// Result type for crypto operations.
pub type CryptoResult<T> = std::result::Result<T, CryptoError>;

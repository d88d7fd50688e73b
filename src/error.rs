// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Crate-wide error taxonomy.
//!
//! | Variant          | Meaning                                                  |
//! |------------------|----------------------------------------------------------|
//! | `Validation`     | Bad input shape or range; fix the input and retry        |
//! | `NotFound`       | Identifier does not exist                                |
//! | `Forbidden`      | Identifier belongs to another user, or a business rule   |
//! |                  | blocks the operation (category still in use)             |
//! | `Integrity`      | Decryption or checksum failure; restore from a snapshot  |
//! | `SchemaMismatch` | Store file format/version is not this build's            |
//! | `Reauthenticate` | Session key was evicted (logout or idle timeout)         |
//!
//! Sparse history is not an error: insight operations return
//! [`crate::insight::Insight::InsufficientData`] instead.

use std::io;

use crate::crypto::CryptoError;

/// Error type for all vault operations.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("schema mismatch: found {found}, expected {expected}")]
    SchemaMismatch { found: String, expected: String },

    #[error("session key evicted, re-authentication required")]
    Reauthenticate,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("crypto error: {0}")]
    Crypto(String),
}

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

impl VaultError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    /// Whether retrying the same call can ever succeed without user action.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Integrity(_) | Self::SchemaMismatch { .. })
    }

    /// Recovery instructions to surface to the user, if any.
    pub fn recovery_hint(&self) -> Option<&'static str> {
        match self {
            Self::Integrity(_) => Some(
                "The store file failed its integrity check and was not modified. \
                 List the available backup snapshots, verify the newest one, and \
                 restore it to recover the last known good state.",
            ),
            Self::SchemaMismatch { .. } => Some(
                "The store file was written by an incompatible version. Open it with \
                 the matching release or restore a snapshot taken by this version.",
            ),
            Self::Reauthenticate => Some("Log in again to unlock the store."),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<csv::Error> for VaultError {
    fn from(e: csv::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<CryptoError> for VaultError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::AuthenticationFailed | CryptoError::Malformed(_) => {
                Self::Integrity(e.to_string())
            }
            other => Self::Crypto(other.to_string()),
        }
    }
}

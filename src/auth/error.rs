// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication failures.

use crate::error::VaultError;

/// Why an [`super::AuthGate`] refused to return an identity.
///
/// Unknown usernames and wrong passwords are deliberately the same variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("authentication backend unavailable: {0}")]
    Unavailable(String),
}

impl AuthFailure {
    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthFailure::InvalidCredentials => "invalid_credentials",
            AuthFailure::Unavailable(_) => "auth_unavailable",
        }
    }
}

impl From<AuthFailure> for VaultError {
    fn from(e: AuthFailure) -> Self {
        VaultError::Forbidden(e.to_string())
    }
}

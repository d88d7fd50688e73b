// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! The core never checks credentials on its own. It consumes the result of
//! an [`AuthGate`]: a verified [`UserIdentity`]. Every other module scopes
//! data by that identity.
//!
//! ## Flow
//!
//! 1. Caller collects [`Credentials`] (UI is out of scope)
//! 2. An `AuthGate` returns a `UserIdentity` or an [`AuthFailure`]
//! 3. [`crate::vault::Vault::start_session`] derives the store key and opens
//!    a [`Session`]
//! 4. Logout or idle timeout evicts the key; keyed calls then fail with
//!    `Reauthenticate`
//!
//! [`LocalAuthGate`] is the bundled gate backed by the account registry in
//! the store file.

pub mod error;
pub mod gate;
pub mod identity;
pub mod session;

pub use error::AuthFailure;
pub use gate::{AuthGate, LocalAuthGate};
pub use identity::{Credentials, UserIdentity};
pub use session::Session;

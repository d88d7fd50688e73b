// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Encrypted Storage Module
//!
//! Durable, encrypted persistence of every domain record, plus backup
//! rotation.
//!
//! ## Security Model
//!
//! - Each user's store key is derived from their password (Argon2id) and
//!   lives only inside a [`crate::auth::Session`]
//! - Every record is sealed with AES-256-GCM, bound to its record key
//! - The file carries a SHA-256 checksum of its payload; any mismatch or
//!   AEAD failure is an `Integrity` error, never partial plaintext
//! - Writes are write-temp, fsync, rename under an exclusive file lock
//!
//! ## Storage Layout
//!
//! ```text
//! <data_dir>/
//!   ledger.vault        # envelope: accounts, sealed records, rotation index
//!   ledger.lock         # advisory lock (fs2)
//!   backups/
//!     snapshot-0000000007.vault
//! ```
//!
//! ## Record Keys
//!
//! ```text
//! category/{category_id}
//! tx/{transaction_id}
//! budget/{category_id}/{YYYY-MM}
//! profile/{user_id}
//! ```

pub mod backup;
pub mod encrypted_store;
pub mod envelope;
pub mod lock;
pub mod ownership;
pub mod paths;
pub mod repository;
pub mod spend_cache;

pub use backup::BackupRotator;
pub use encrypted_store::{seal_key_check, EncryptedStore, RecordScan, WriteBatch};
pub use envelope::{AccountRecord, BackupSnapshot};
pub use ownership::{OwnedResource, OwnershipCheck, OwnershipEnforcer};
pub use paths::StoragePaths;
pub use repository::{BudgetRepository, CategoryRepository, ProfileRepository, TransactionRepository};
pub use spend_cache::{SpendCache, SpendKey};

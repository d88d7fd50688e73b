// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! On-disk layout of the store file.
//!
//! ```text
//! {
//!   "format": "finance-vault",
//!   "schema_version": 1,
//!   "checksum": "<sha256 hex of the exact payload bytes>",
//!   "payload": {
//!     "store_id": "...",
//!     "created_at": "...",
//!     "accounts": { "<user_id>": { username, password_hash, kdf, key_check, ... } },
//!     "records":  { "<record key>": { owner_user_id, nonce, ciphertext } },
//!     "rotation": { "next_index": 7, "snapshots": [ ... ] }
//!   }
//! }
//! ```
//!
//! Header and checksum are validated before the payload is deserialized, so
//! a foreign or damaged file never reaches the domain layer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::crypto::{KdfParams, SealedBlob};
use crate::error::{VaultError, VaultResult};

/// Format tag written into every store file.
pub const FORMAT_TAG: &str = "finance-vault";

/// Current payload schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Credentials and key material of one registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub user_id: String,
    pub username: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    /// Parameters for re-deriving the store key.
    pub kdf: KdfParams,
    /// Known constant sealed under the store key.
    pub key_check: SealedBlob,
    pub created_at: DateTime<Utc>,
}

/// One encrypted record and its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedRecord {
    pub owner_user_id: String,
    #[serde(flatten)]
    pub blob: SealedBlob,
}

/// Metadata of one backup snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSnapshot {
    /// Monotonic rotation index.
    pub index: u64,
    pub created_at: DateTime<Utc>,
    pub file_name: String,
    /// SHA-256 (hex) of the snapshot file bytes.
    pub checksum: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationIndex {
    pub next_index: u64,
    /// Oldest first.
    pub snapshots: Vec<BackupSnapshot>,
}

/// Complete decoded contents of a store file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreState {
    pub store_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub accounts: BTreeMap<String, AccountRecord>,
    pub records: BTreeMap<String, SealedRecord>,
    pub rotation: RotationIndex,
}

impl StoreState {
    pub fn empty() -> Self {
        Self {
            store_id: Uuid::new_v4(),
            created_at: Utc::now(),
            accounts: BTreeMap::new(),
            records: BTreeMap::new(),
            rotation: RotationIndex::default(),
        }
    }
}

#[derive(Serialize)]
struct EnvelopeOut<'a> {
    format: &'static str,
    schema_version: u32,
    checksum: String,
    payload: &'a RawValue,
}

#[derive(Deserialize)]
struct EnvelopeIn {
    format: String,
    schema_version: u32,
    checksum: String,
    payload: Box<RawValue>,
}

/// Hex SHA-256 digest.
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Serialize a state into store file bytes.
pub fn encode(state: &StoreState) -> VaultResult<Vec<u8>> {
    let payload = serde_json::to_string(state)?;
    let checksum = sha256_hex(payload.as_bytes());
    let raw = RawValue::from_string(payload)?;
    let envelope = EnvelopeOut {
        format: FORMAT_TAG,
        schema_version: SCHEMA_VERSION,
        checksum,
        payload: &raw,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Parse and validate store file bytes.
///
/// - unparseable envelope or checksum mismatch: `Integrity`
/// - foreign format tag or other schema version: `SchemaMismatch`
pub fn decode(bytes: &[u8]) -> VaultResult<StoreState> {
    let envelope: EnvelopeIn = serde_json::from_slice(bytes)
        .map_err(|e| VaultError::integrity(format!("store file is not readable: {e}")))?;

    if envelope.format != FORMAT_TAG {
        return Err(VaultError::SchemaMismatch {
            found: format!("format '{}'", envelope.format),
            expected: format!("format '{FORMAT_TAG}'"),
        });
    }
    if envelope.schema_version != SCHEMA_VERSION {
        return Err(VaultError::SchemaMismatch {
            found: format!("schema {}", envelope.schema_version),
            expected: format!("schema {SCHEMA_VERSION}"),
        });
    }

    let payload = envelope.payload.get();
    if sha256_hex(payload.as_bytes()) != envelope.checksum {
        return Err(VaultError::integrity("store file checksum mismatch"));
    }

    serde_json::from_str(payload).map_err(|e| VaultError::SchemaMismatch {
        found: format!("unrecognised payload layout ({e})"),
        expected: format!("schema {SCHEMA_VERSION}"),
    })
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Encrypted key-value store backed by a single file.
//!
//! Every record is sealed with AES-256-GCM under the owner's store key, with
//! the record key as associated data. The whole store (accounts, sealed
//! records, rotation index) is one envelope file, replaced atomically:
//!
//! 1. take the exclusive lock on `ledger.lock`
//! 2. read and validate the current file
//! 3. apply the change in memory
//! 4. write `ledger.vault.tmp`, fsync, rename over `ledger.vault`
//! 5. optionally snapshot, still under the same lock
//!
//! Readers take the shared lock, so they never observe a torn file.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::envelope::{
    self, sha256_hex, AccountRecord, BackupSnapshot, SealedRecord, StoreState,
};
use super::lock::StoreLock;
use super::paths::{temp_path, StoragePaths};
use crate::auth::{Session, UserIdentity};
use crate::crypto::{self, SealedBlob, StoreKey};
use crate::error::{VaultError, VaultResult};

const KEY_CHECK_PLAINTEXT: &[u8] = b"finance-vault key check";

fn key_check_aad(user_id: &str) -> String {
    format!("key-check/{user_id}")
}

/// Seal the known constant that lets a derived key be checked at unlock.
pub fn seal_key_check(key: &StoreKey, user_id: &str) -> VaultResult<SealedBlob> {
    Ok(crypto::seal(
        key,
        KEY_CHECK_PLAINTEXT,
        key_check_aad(user_id).as_bytes(),
    )?)
}

fn verify_key_check(key: &StoreKey, account: &AccountRecord) -> VaultResult<()> {
    let plaintext = crypto::open(
        key,
        &account.key_check,
        key_check_aad(&account.user_id).as_bytes(),
    )?;
    if plaintext != KEY_CHECK_PLAINTEXT {
        return Err(VaultError::integrity("key check mismatch"));
    }
    Ok(())
}

fn check_owner(user_id: &str, key: &str, record: &SealedRecord) -> VaultResult<()> {
    if record.owner_user_id == user_id {
        Ok(())
    } else {
        Err(VaultError::forbidden(format!(
            "record {key} belongs to another user"
        )))
    }
}

/// Write bytes to `path` via a fsynced sibling temp file and rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let temp = temp_path(path);
    {
        let mut file = File::create(&temp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&temp, path)
}

// =============================================================================
// Write batches
// =============================================================================

#[derive(Debug, Clone)]
enum BatchOp {
    Put { key: String, value: Vec<u8> },
    Delete { key: String },
}

/// Puts and deletes committed together in one atomic file replacement.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<String>, value: Vec<u8>) -> &mut Self {
        self.ops.push(BatchOp::Put {
            key: key.into(),
            value,
        });
        self
    }

    /// Delete an existing record; committing fails with `NotFound` if absent.
    pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
        self.ops.push(BatchOp::Delete { key: key.into() });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

// =============================================================================
// Lazy record scans
// =============================================================================

/// Point-in-time copy of sealed records, decrypted one at a time.
///
/// Later writes to the store do not affect a scan already taken. The key is
/// fetched from the session for every record, so eviction mid-scan yields
/// one `Reauthenticate` error and ends the scan.
pub struct RecordScan<'s> {
    session: &'s Session,
    records: std::vec::IntoIter<(String, SealedBlob)>,
}

impl Iterator for RecordScan<'_> {
    type Item = VaultResult<(String, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, blob) = self.records.next()?;
        let store_key = match self.session.key() {
            Ok(store_key) => store_key,
            Err(e) => {
                self.records = Vec::new().into_iter();
                return Some(Err(e));
            }
        };
        Some(
            crypto::open(&store_key, &blob, key.as_bytes())
                .map(|plaintext| (key, plaintext))
                .map_err(VaultError::from),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}

// =============================================================================
// Store
// =============================================================================

/// Encrypted single-file store with rotating backups.
#[derive(Debug)]
pub struct EncryptedStore {
    paths: StoragePaths,
    retention: usize,
    snapshot_on_write: bool,
}

impl EncryptedStore {
    /// Open the store under `paths`, creating an empty one if absent.
    ///
    /// An existing file is validated immediately, so a damaged or foreign
    /// file fails here with `Integrity` or `SchemaMismatch`.
    pub fn open(
        paths: StoragePaths,
        retention: usize,
        snapshot_on_write: bool,
    ) -> VaultResult<Self> {
        fs::create_dir_all(paths.root())?;
        fs::create_dir_all(paths.backups_dir())?;

        let store = Self {
            paths,
            retention: retention.max(1),
            snapshot_on_write,
        };

        let _lock = StoreLock::exclusive(&store.paths.lock_file())?;
        if store.paths.store_file().exists() {
            let state = store.read_state()?;
            info!(
                store_id = %state.store_id,
                accounts = state.accounts.len(),
                records = state.records.len(),
                "Opened encrypted store"
            );
        } else {
            let state = StoreState::empty();
            store.write_state(&state)?;
            info!(
                store_id = %state.store_id,
                path = %store.paths.store_file().display(),
                "Created encrypted store"
            );
        }

        Ok(store)
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    pub fn store_id(&self) -> VaultResult<Uuid> {
        Ok(self.read_shared()?.store_id)
    }

    // ========== Raw state I/O ==========

    fn read_state(&self) -> VaultResult<StoreState> {
        let bytes = fs::read(self.paths.store_file())?;
        envelope::decode(&bytes)
    }

    fn read_shared(&self) -> VaultResult<StoreState> {
        let _lock = StoreLock::shared(&self.paths.lock_file())?;
        self.read_state()
    }

    fn write_state(&self, state: &StoreState) -> VaultResult<()> {
        let bytes = envelope::encode(state)?;
        write_atomic(&self.paths.store_file(), &bytes)?;
        Ok(())
    }

    /// Persist a mutated state; must be called with the exclusive lock held.
    fn commit_locked(&self, state: &mut StoreState) -> VaultResult<()> {
        self.write_state(state)?;
        if self.snapshot_on_write {
            if let Err(e) = self.snapshot_locked(state) {
                warn!(error = %e, "Snapshot after write failed; primary store is intact");
            }
        }
        Ok(())
    }

    // ========== Accounts ==========

    /// Register a new account. Usernames are unique case-insensitively.
    pub fn insert_account(&self, account: AccountRecord) -> VaultResult<()> {
        let _lock = StoreLock::exclusive(&self.paths.lock_file())?;
        let mut state = self.read_state()?;

        if state
            .accounts
            .values()
            .any(|a| a.username.eq_ignore_ascii_case(&account.username))
        {
            return Err(VaultError::validation(format!(
                "username '{}' is already taken",
                account.username
            )));
        }
        if state.accounts.contains_key(&account.user_id) {
            return Err(VaultError::validation("user id already registered"));
        }

        let user_id = account.user_id.clone();
        state.accounts.insert(user_id.clone(), account);
        self.commit_locked(&mut state)?;
        info!(user_id = %user_id, "Account registered");
        Ok(())
    }

    pub fn account(&self, user_id: &str) -> VaultResult<Option<AccountRecord>> {
        Ok(self.read_shared()?.accounts.get(user_id).cloned())
    }

    pub fn account_by_username(&self, username: &str) -> VaultResult<Option<AccountRecord>> {
        Ok(self
            .read_shared()?
            .accounts
            .into_values()
            .find(|a| a.username.eq_ignore_ascii_case(username)))
    }

    /// Derive the user's store key and open a session.
    ///
    /// `identity` must come from a successful AuthGate result. A key that
    /// fails the key check surfaces as `Integrity`.
    pub fn unlock(
        &self,
        identity: UserIdentity,
        password: &[u8],
        idle_timeout: Duration,
    ) -> VaultResult<Session> {
        let account = self
            .account(&identity.user_id)?
            .ok_or_else(|| VaultError::not_found(format!("account {}", identity.user_id)))?;

        let key = crypto::derive_key(password, &account.kdf)?;
        verify_key_check(&key, &account)?;

        info!(user_id = %identity.user_id, "Session started");
        Ok(Session::new(identity, key, idle_timeout))
    }

    /// Delete the session user's account and every record they own, then
    /// end the session. Existing snapshots age out through rotation.
    pub fn remove_account(&self, session: &Session) -> VaultResult<usize> {
        session.key()?;
        let user_id = session.user_id();

        let _lock = StoreLock::exclusive(&self.paths.lock_file())?;
        let mut state = self.read_state()?;
        if state.accounts.remove(user_id).is_none() {
            return Err(VaultError::not_found(format!("account {user_id}")));
        }
        let before = state.records.len();
        state.records.retain(|_, r| r.owner_user_id != user_id);
        let removed = before - state.records.len();

        self.commit_locked(&mut state)?;
        info!(user_id = %user_id, records_removed = removed, "Account removed");
        session.end();
        Ok(removed)
    }

    // ========== Records ==========

    /// Store `plaintext` under `key`, replacing any previous value.
    pub fn put(&self, session: &Session, key: &str, plaintext: &[u8]) -> VaultResult<()> {
        let mut batch = WriteBatch::new();
        batch.put(key, plaintext.to_vec());
        self.apply(session, batch)
    }

    /// Decrypt the record under `key`.
    pub fn get(&self, session: &Session, key: &str) -> VaultResult<Vec<u8>> {
        let store_key = session.key()?;
        let state = self.read_shared()?;
        let record = state
            .records
            .get(key)
            .ok_or_else(|| VaultError::not_found(format!("record {key}")))?;
        check_owner(session.user_id(), key, record)?;
        Ok(crypto::open(&store_key, &record.blob, key.as_bytes())?)
    }

    /// Delete the record under `key`.
    pub fn delete(&self, session: &Session, key: &str) -> VaultResult<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.apply(session, batch)
    }

    /// Whether `key` exists and belongs to the session user.
    pub fn contains(&self, session: &Session, key: &str) -> VaultResult<bool> {
        session.key()?;
        let state = self.read_shared()?;
        Ok(state
            .records
            .get(key)
            .is_some_and(|r| r.owner_user_id == session.user_id()))
    }

    /// Lazily decrypt the session user's records whose key starts with
    /// `prefix`, in key order. Other users' records are skipped.
    pub fn scan<'s>(&self, session: &'s Session, prefix: &str) -> VaultResult<RecordScan<'s>> {
        session.key()?;
        let state = self.read_shared()?;
        let user_id = session.user_id();
        let records: Vec<(String, SealedBlob)> = state
            .records
            .into_iter()
            .filter(|(k, r)| k.starts_with(prefix) && r.owner_user_id == user_id)
            .map(|(k, r)| (k, r.blob))
            .collect();
        Ok(RecordScan {
            session,
            records: records.into_iter(),
        })
    }

    /// Eagerly decrypt everything [`Self::scan`] would yield.
    pub fn list(&self, session: &Session, prefix: &str) -> VaultResult<Vec<(String, Vec<u8>)>> {
        self.scan(session, prefix)?.collect()
    }

    /// Commit a batch atomically. Either every operation lands or none.
    pub fn apply(&self, session: &Session, batch: WriteBatch) -> VaultResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let store_key = session.key()?;
        let user_id = session.user_id();
        let op_count = batch.len();

        let _lock = StoreLock::exclusive(&self.paths.lock_file())?;
        let mut state = self.read_state()?;
        if !state.accounts.contains_key(user_id) {
            return Err(VaultError::forbidden("account no longer exists"));
        }

        for op in batch.ops {
            match op {
                BatchOp::Put { key, value } => {
                    if let Some(existing) = state.records.get(&key) {
                        check_owner(user_id, &key, existing)?;
                    }
                    let blob = crypto::seal(&store_key, &value, key.as_bytes())?;
                    state.records.insert(
                        key,
                        SealedRecord {
                            owner_user_id: user_id.to_string(),
                            blob,
                        },
                    );
                }
                BatchOp::Delete { key } => {
                    let existing = state
                        .records
                        .get(&key)
                        .ok_or_else(|| VaultError::not_found(format!("record {key}")))?;
                    check_owner(user_id, &key, existing)?;
                    state.records.remove(&key);
                }
            }
        }

        self.commit_locked(&mut state)?;
        debug!(ops = op_count, "Write batch committed");
        Ok(())
    }

    // ========== Backups ==========

    /// Copy the current store file into a new snapshot and prune the oldest
    /// snapshots beyond the retention count. Needs no session: the copy
    /// stays encrypted.
    pub fn snapshot(&self) -> VaultResult<BackupSnapshot> {
        let _lock = StoreLock::exclusive(&self.paths.lock_file())?;
        let mut state = self.read_state()?;
        self.snapshot_locked(&mut state)
    }

    fn snapshot_locked(&self, state: &mut StoreState) -> VaultResult<BackupSnapshot> {
        let bytes = fs::read(self.paths.store_file())?;
        let index = state.rotation.next_index;
        write_atomic(&self.paths.snapshot(index), &bytes)?;

        let snapshot = BackupSnapshot {
            index,
            created_at: Utc::now(),
            file_name: StoragePaths::snapshot_file_name(index),
            checksum: sha256_hex(&bytes),
        };
        state.rotation.next_index += 1;
        state.rotation.snapshots.push(snapshot.clone());

        let excess = state
            .rotation
            .snapshots
            .len()
            .saturating_sub(self.retention);
        let pruned: Vec<BackupSnapshot> = state.rotation.snapshots.drain(..excess).collect();

        self.write_state(state)?;

        for old in &pruned {
            let path = self.paths.backups_dir().join(&old.file_name);
            match fs::remove_file(&path) {
                Ok(()) => debug!(index = old.index, "Pruned backup snapshot"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(index = old.index, error = %e, "Failed to delete pruned snapshot"),
            }
        }

        info!(
            index,
            retained = state.rotation.snapshots.len(),
            "Backup snapshot taken"
        );
        Ok(snapshot)
    }

    /// Snapshots currently in the rotation index, oldest first.
    pub fn list_snapshots(&self) -> VaultResult<Vec<BackupSnapshot>> {
        Ok(self.read_shared()?.rotation.snapshots)
    }

    fn load_snapshot(&self, snapshot: &BackupSnapshot) -> VaultResult<StoreState> {
        let path = self.paths.backups_dir().join(&snapshot.file_name);
        let bytes = fs::read(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                VaultError::not_found(format!("snapshot {} file", snapshot.index))
            } else {
                VaultError::Io(e)
            }
        })?;
        if sha256_hex(&bytes) != snapshot.checksum {
            return Err(VaultError::integrity(format!(
                "snapshot {} checksum mismatch",
                snapshot.index
            )));
        }
        envelope::decode(&bytes)
    }

    fn indexed_snapshot(state: &StoreState, index: u64) -> VaultResult<BackupSnapshot> {
        state
            .rotation
            .snapshots
            .iter()
            .find(|s| s.index == index)
            .cloned()
            .ok_or_else(|| VaultError::not_found(format!("snapshot {index}")))
    }

    fn verify_records(state: &StoreState, user_id: &str, key: &StoreKey) -> VaultResult<usize> {
        let mut checked = 0;
        for (record_key, record) in &state.records {
            if record.owner_user_id == user_id {
                crypto::open(key, &record.blob, record_key.as_bytes())?;
                checked += 1;
            }
        }
        Ok(checked)
    }

    /// Check a snapshot's checksum, schema, store identity, and that every
    /// record of the session user decrypts. Returns the number of records
    /// checked.
    pub fn verify_snapshot(&self, session: &Session, snapshot: &BackupSnapshot) -> VaultResult<usize> {
        let key = session.key()?;
        let _lock = StoreLock::shared(&self.paths.lock_file())?;
        let current = self.read_state()?;
        let meta = Self::indexed_snapshot(&current, snapshot.index)?;
        let restored = self.load_snapshot(&meta)?;
        if restored.store_id != current.store_id {
            return Err(VaultError::validation(format!(
                "snapshot {} belongs to a different store",
                meta.index
            )));
        }
        Self::verify_records(&restored, session.user_id(), &key)
    }

    /// Replace accounts and records with the snapshot's contents.
    ///
    /// The current rotation index is kept so later snapshots stay listed.
    pub fn restore(&self, session: &Session, snapshot: &BackupSnapshot) -> VaultResult<()> {
        let key = session.key()?;
        let _lock = StoreLock::exclusive(&self.paths.lock_file())?;
        let current = self.read_state()?;
        let meta = Self::indexed_snapshot(&current, snapshot.index)?;
        let mut restored = self.load_snapshot(&meta)?;
        if restored.store_id != current.store_id {
            return Err(VaultError::validation(format!(
                "snapshot {} belongs to a different store",
                meta.index
            )));
        }
        let checked = Self::verify_records(&restored, session.user_id(), &key)?;

        restored.rotation = current.rotation;
        self.write_state(&restored)?;
        info!(index = meta.index, records = checked, "Store restored from snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::derive_key;
    use crate::test_support::fast_kdf;
    use tempfile::TempDir;

    fn test_store(retention: usize, snapshot_on_write: bool) -> (TempDir, EncryptedStore) {
        let dir = tempfile::tempdir().unwrap();
        let store =
            EncryptedStore::open(StoragePaths::new(dir.path()), retention, snapshot_on_write)
                .unwrap();
        (dir, store)
    }

    fn test_session(store: &EncryptedStore, username: &str) -> Session {
        let user_id = format!("user-{username}");
        let kdf = fast_kdf();
        let key = derive_key(b"password123", &kdf).unwrap();
        store
            .insert_account(AccountRecord {
                user_id: user_id.clone(),
                username: username.to_string(),
                password_hash: String::new(),
                kdf,
                key_check: seal_key_check(&key, &user_id).unwrap(),
                created_at: Utc::now(),
            })
            .unwrap();
        store
            .unlock(
                UserIdentity {
                    user_id,
                    username: username.to_string(),
                },
                b"password123",
                Duration::from_secs(600),
            )
            .unwrap()
    }

    #[test]
    fn put_get_round_trip() {
        let (_dir, store) = test_store(5, false);
        let session = test_session(&store, "alice");

        let payload = br#"{"amount":"-12.50","note":"lunch"}"#;
        store.put(&session, "tx/1", payload).unwrap();
        assert_eq!(store.get(&session, "tx/1").unwrap(), payload);

        store.put(&session, "tx/1", b"replaced").unwrap();
        assert_eq!(store.get(&session, "tx/1").unwrap(), b"replaced");
    }

    #[test]
    fn plaintext_never_hits_disk() {
        let (_dir, store) = test_store(5, false);
        let session = test_session(&store, "alice");
        store.put(&session, "tx/1", b"very-secret-note").unwrap();

        let raw = fs::read(store.paths().store_file()).unwrap();
        let text = String::from_utf8_lossy(&raw);
        assert!(!text.contains("very-secret-note"));
    }

    #[test]
    fn missing_record_is_not_found() {
        let (_dir, store) = test_store(5, false);
        let session = test_session(&store, "alice");
        assert!(matches!(
            store.get(&session, "tx/none"),
            Err(VaultError::NotFound(_))
        ));
        assert!(matches!(
            store.delete(&session, "tx/none"),
            Err(VaultError::NotFound(_))
        ));
    }

    #[test]
    fn other_users_records_are_forbidden() {
        let (_dir, store) = test_store(5, false);
        let alice = test_session(&store, "alice");
        let bob = test_session(&store, "bob");
        store.put(&alice, "tx/a", b"alice data").unwrap();

        assert!(matches!(store.get(&bob, "tx/a"), Err(VaultError::Forbidden(_))));
        assert!(matches!(
            store.put(&bob, "tx/a", b"overwrite"),
            Err(VaultError::Forbidden(_))
        ));
        assert!(matches!(store.delete(&bob, "tx/a"), Err(VaultError::Forbidden(_))));
        assert!(!store.contains(&bob, "tx/a").unwrap());
        assert_eq!(store.list(&bob, "tx/").unwrap().len(), 0);

        assert_eq!(store.get(&alice, "tx/a").unwrap(), b"alice data");
    }

    #[test]
    fn one_byte_tamper_fails_with_integrity_error() {
        let (_dir, store) = test_store(5, false);
        let session = test_session(&store, "alice");
        store.put(&session, "tx/1", b"original").unwrap();

        let path = store.paths().store_file();
        let mut bytes = fs::read(&path).unwrap();
        let marker = b"\"ciphertext\":\"";
        let pos = bytes
            .windows(marker.len())
            .position(|w| w == marker)
            .unwrap()
            + marker.len();
        bytes[pos] = if bytes[pos] == b'A' { b'B' } else { b'A' };
        fs::write(&path, &bytes).unwrap();

        let err = store.get(&session, "tx/1").unwrap_err();
        assert!(matches!(err, VaultError::Integrity(_)));
        assert!(err.recovery_hint().is_some());
    }

    #[test]
    fn resealed_tamper_is_caught_by_aead() {
        let (_dir, store) = test_store(5, false);
        let session = test_session(&store, "alice");
        store.put(&session, "tx/1", b"original").unwrap();
        store.put(&session, "tx/2", b"other").unwrap();

        // Swap ciphertexts between keys and rewrite with a valid checksum.
        let path = store.paths().store_file();
        let mut state = envelope::decode(&fs::read(&path).unwrap()).unwrap();
        let one = state.records["tx/1"].clone();
        let two = state.records["tx/2"].clone();
        state.records.insert("tx/1".into(), two);
        state.records.insert("tx/2".into(), one);
        fs::write(&path, envelope::encode(&state).unwrap()).unwrap();

        assert!(matches!(
            store.get(&session, "tx/1"),
            Err(VaultError::Integrity(_))
        ));
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let (_dir, store) = test_store(5, false);
        let alice = test_session(&store, "alice");
        let bob = test_session(&store, "bob");
        store.put(&alice, "tx/a", b"alice").unwrap();

        let mut batch = WriteBatch::new();
        batch.put("tx/b1", b"one".to_vec()).delete("tx/a");
        assert!(matches!(
            store.apply(&bob, batch),
            Err(VaultError::Forbidden(_))
        ));
        assert!(!store.contains(&bob, "tx/b1").unwrap());
        assert_eq!(store.get(&alice, "tx/a").unwrap(), b"alice");
    }

    #[test]
    fn scan_is_point_in_time_and_prefix_scoped() {
        let (_dir, store) = test_store(5, false);
        let session = test_session(&store, "alice");
        store.put(&session, "tx/1", b"one").unwrap();
        store.put(&session, "tx/2", b"two").unwrap();
        store.put(&session, "category/1", b"food").unwrap();

        let scan = store.scan(&session, "tx/").unwrap();
        store.delete(&session, "tx/2").unwrap();
        store.put(&session, "tx/3", b"three").unwrap();

        let seen: Vec<(String, Vec<u8>)> = scan.collect::<VaultResult<_>>().unwrap();
        assert_eq!(
            seen,
            vec![
                ("tx/1".to_string(), b"one".to_vec()),
                ("tx/2".to_string(), b"two".to_vec()),
            ]
        );
    }

    #[test]
    fn scan_stops_decrypting_after_logout() {
        let (_dir, store) = test_store(5, false);
        let session = test_session(&store, "alice");
        for i in 0..3 {
            store.put(&session, &format!("tx/{i}"), b"secret").unwrap();
        }

        let mut scan = store.scan(&session, "tx/").unwrap();
        assert!(scan.next().unwrap().is_ok());
        session.end();

        assert!(matches!(scan.next(), Some(Err(VaultError::Reauthenticate))));
        assert!(scan.next().is_none());
    }

    #[test]
    fn evicted_session_must_reauthenticate() {
        let (_dir, store) = test_store(5, false);
        let session = test_session(&store, "alice");
        store.put(&session, "tx/1", b"x").unwrap();
        session.end();

        assert!(matches!(
            store.get(&session, "tx/1"),
            Err(VaultError::Reauthenticate)
        ));
        assert!(matches!(
            store.put(&session, "tx/2", b"y"),
            Err(VaultError::Reauthenticate)
        ));
    }

    #[test]
    fn wrong_password_fails_key_check() {
        let (_dir, store) = test_store(5, false);
        let session = test_session(&store, "alice");
        let identity = session.identity().clone();

        let err = store
            .unlock(identity, b"not-the-password", Duration::from_secs(60))
            .unwrap_err();
        assert!(matches!(err, VaultError::Integrity(_)));
    }

    #[test]
    fn duplicate_username_rejected() {
        let (_dir, store) = test_store(5, false);
        let _alice = test_session(&store, "alice");
        let kdf = fast_kdf();
        let key = derive_key(b"whatever1", &kdf).unwrap();
        let err = store
            .insert_account(AccountRecord {
                user_id: "another-id".into(),
                username: "ALICE".into(),
                password_hash: String::new(),
                kdf,
                key_check: seal_key_check(&key, "another-id").unwrap(),
                created_at: Utc::now(),
            })
            .unwrap_err();
        assert!(matches!(err, VaultError::Validation(_)));
    }

    #[test]
    fn reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StoragePaths::new(dir.path());
        {
            let store = EncryptedStore::open(paths.clone(), 5, false).unwrap();
            let session = test_session(&store, "alice");
            store.put(&session, "tx/1", b"persisted").unwrap();
        }
        let store = EncryptedStore::open(paths, 5, false).unwrap();
        let session = store
            .unlock(
                UserIdentity {
                    user_id: "user-alice".into(),
                    username: "alice".into(),
                },
                b"password123",
                Duration::from_secs(60),
            )
            .unwrap();
        assert_eq!(store.get(&session, "tx/1").unwrap(), b"persisted");
    }

    #[test]
    fn open_rejects_foreign_schema() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StoragePaths::new(dir.path());
        drop(EncryptedStore::open(paths.clone(), 5, false).unwrap());

        let text = fs::read_to_string(paths.store_file()).unwrap();
        fs::write(
            paths.store_file(),
            text.replace("\"schema_version\":1", "\"schema_version\":99"),
        )
        .unwrap();

        assert!(matches!(
            EncryptedStore::open(paths, 5, false),
            Err(VaultError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn rotation_keeps_newest_n_and_each_restores() {
        let retention = 3;
        let (_dir, store) = test_store(retention, false);
        let session = test_session(&store, "alice");

        let mut taken = Vec::new();
        for version in 0..=retention {
            store
                .put(&session, "budget/state", format!("v{version}").as_bytes())
                .unwrap();
            taken.push(store.snapshot().unwrap());
        }

        let listed = store.list_snapshots().unwrap();
        assert_eq!(listed.len(), retention);
        assert_eq!(listed.first().unwrap().index, 1);
        assert!(!store.paths().snapshot(taken[0].index).exists());
        assert!(matches!(
            store.restore(&session, &taken[0]),
            Err(VaultError::NotFound(_))
        ));

        store.put(&session, "budget/state", b"latest").unwrap();
        for (version, snapshot) in taken.iter().enumerate().skip(1) {
            assert_eq!(store.verify_snapshot(&session, snapshot).unwrap(), 1);
            store.restore(&session, snapshot).unwrap();
            assert_eq!(
                store.get(&session, "budget/state").unwrap(),
                format!("v{version}").as_bytes()
            );
        }
        // Restoring keeps the rotation index intact.
        assert_eq!(store.list_snapshots().unwrap(), listed);
    }

    #[test]
    fn snapshot_on_write_rotates_automatically() {
        let (_dir, store) = test_store(2, true);
        let session = test_session(&store, "alice");
        for i in 0..4 {
            store.put(&session, &format!("tx/{i}"), b"x").unwrap();
        }
        let snapshots = store.list_snapshots().unwrap();
        assert_eq!(snapshots.len(), 2);
        assert!(snapshots[0].index < snapshots[1].index);

        let on_disk = fs::read_dir(store.paths().backups_dir()).unwrap().count();
        assert_eq!(on_disk, 2);
    }

    #[test]
    fn tampered_snapshot_is_rejected() {
        let (_dir, store) = test_store(5, false);
        let session = test_session(&store, "alice");
        store.put(&session, "tx/1", b"x").unwrap();
        let snapshot = store.snapshot().unwrap();

        let path = store.paths().snapshot(snapshot.index);
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 2;
        bytes[last] ^= 0x01;
        fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            store.restore(&session, &snapshot),
            Err(VaultError::Integrity(_))
        ));
        assert_eq!(store.get(&session, "tx/1").unwrap(), b"x");
    }

    #[test]
    fn remove_account_drops_owned_records() {
        let (_dir, store) = test_store(5, false);
        let alice = test_session(&store, "alice");
        let bob = test_session(&store, "bob");
        store.put(&alice, "tx/a1", b"1").unwrap();
        store.put(&alice, "tx/a2", b"2").unwrap();
        store.put(&bob, "tx/b1", b"3").unwrap();

        assert_eq!(store.remove_account(&alice).unwrap(), 2);
        assert!(!alice.is_active());
        assert!(store.account("user-alice").unwrap().is_none());
        assert_eq!(store.get(&bob, "tx/b1").unwrap(), b"3");
    }
}

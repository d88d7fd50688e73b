// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! AES-256-GCM sealing of store records.
//!
//! Each call to [`seal`] draws a fresh 96-bit nonce. The caller-supplied
//! associated data binds a ciphertext to its record key, so a sealed blob
//! copied under a different key fails to open.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::{CryptoError, CryptoResult};

const NONCE_LEN: usize = 12;

/// 256-bit symmetric key derived from a user's password.
///
/// Zeroized on drop. Never serialized.
#[derive(Clone)]
pub struct StoreKey {
    key: [u8; Self::LEN],
}

impl StoreKey {
    pub const LEN: usize = 32;

    pub fn from_bytes(key: [u8; Self::LEN]) -> Self {
        Self { key }
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.key
    }
}

impl Drop for StoreKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StoreKey(<redacted>)")
    }
}

/// Nonce and ciphertext (with GCM tag), base64-encoded for the store file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBlob {
    pub nonce: String,
    pub ciphertext: String,
}

/// Encrypt `plaintext` under `key`, authenticating `aad` alongside it.
pub fn seal(key: &StoreKey, plaintext: &[u8], aad: &[u8]) -> CryptoResult<SealedBlob> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok(SealedBlob {
        nonce: Base64::encode_string(nonce.as_slice()),
        ciphertext: Base64::encode_string(&ciphertext),
    })
}

/// Decrypt a sealed blob. Any tampering, wrong key or wrong `aad` yields
/// [`CryptoError::AuthenticationFailed`]; no partial plaintext is returned.
pub fn open(key: &StoreKey, blob: &SealedBlob, aad: &[u8]) -> CryptoResult<Vec<u8>> {
    let nonce_bytes = Base64::decode_vec(&blob.nonce)
        .map_err(|e| CryptoError::Malformed(format!("nonce: {e}")))?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(CryptoError::Malformed(format!(
            "nonce must be {NONCE_LEN} bytes, got {}",
            nonce_bytes.len()
        )));
    }
    let ciphertext = Base64::decode_vec(&blob.ciphertext)
        .map_err(|e| CryptoError::Malformed(format!("ciphertext: {e}")))?;

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    cipher
        .decrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: &ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(byte: u8) -> StoreKey {
        StoreKey::from_bytes([byte; StoreKey::LEN])
    }

    #[test]
    fn seal_then_open() {
        let key = test_key(7);
        let blob = seal(&key, b"groceries -42.10", b"tx/1").unwrap();
        assert_eq!(open(&key, &blob, b"tx/1").unwrap(), b"groceries -42.10");
    }

    #[test]
    fn nonces_are_fresh() {
        let key = test_key(7);
        let a = seal(&key, b"same", b"k").unwrap();
        let b = seal(&key, b"same", b"k").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn wrong_key_or_aad_fails_authentication() {
        let blob = seal(&test_key(1), b"payload", b"tx/1").unwrap();
        assert!(matches!(
            open(&test_key(2), &blob, b"tx/1"),
            Err(CryptoError::AuthenticationFailed)
        ));
        assert!(matches!(
            open(&test_key(1), &blob, b"tx/2"),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn flipped_ciphertext_bit_fails_authentication() {
        let key = test_key(3);
        let blob = seal(&key, b"payload", b"k").unwrap();
        let mut raw = Base64::decode_vec(&blob.ciphertext).unwrap();
        raw[0] ^= 0x01;
        let tampered = SealedBlob {
            nonce: blob.nonce.clone(),
            ciphertext: Base64::encode_string(&raw),
        };
        assert!(matches!(
            open(&key, &tampered, b"k"),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn bad_base64_is_malformed() {
        let blob = SealedBlob {
            nonce: "!!!".to_string(),
            ciphertext: String::new(),
        };
        assert!(matches!(
            open(&test_key(1), &blob, b""),
            Err(CryptoError::Malformed(_))
        ));
    }

    #[test]
    fn debug_does_not_leak_key() {
        assert_eq!(format!("{:?}", test_key(9)), "StoreKey(<redacted>)");
    }
}

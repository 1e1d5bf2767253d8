// Copyright 2025-2026 Garner contributors.

//! Password-based encryption of backup artifacts.
//!
//! AES-256-CBC with PKCS#7 padding. The key and IV are derived from the
//! password with PBKDF2-HMAC-SHA256 over fixed salts, so a given password
//! always produces the same (key, IV) pair and identical plaintext
//! encrypts to identical ciphertext. That makes artifacts reproducible,
//! and it also means the scheme offers confidentiality only: no
//! authentication, no semantic security across password reuse.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use crate::{Error, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const KEY_SALT: &[u8] = b"BackupSystemSalt";
const IV_SALT: &[u8] = b"BackupSystemIV";
const PBKDF2_ROUNDS: u32 = 10_000;

/// Holds the key material derived from one password.
pub struct Encryptor {
    key: [u8; 32],
    iv: [u8; 16],
}

impl Encryptor {
    pub fn new(password: &str) -> Encryptor {
        let mut key = [0u8; 32];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), KEY_SALT, PBKDF2_ROUNDS, &mut key);
        let mut iv = [0u8; 16];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), IV_SALT, PBKDF2_ROUNDS, &mut iv);
        Encryptor { key, iv }
    }

    /// Encrypt; the result is `16 * (len / 16 + 1)` bytes. Empty input
    /// stays empty without touching the cipher.
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        if plaintext.is_empty() {
            return Vec::new();
        }
        Aes256CbcEnc::new(&self.key.into(), &self.iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
    }

    /// Decrypt; fails with [Error::BadPassword] when the final block's
    /// padding does not check out, which is indistinguishable from a wrong
    /// password or corrupted data.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.is_empty() {
            return Ok(Vec::new());
        }
        Aes256CbcDec::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| Error::BadPassword)
    }
}

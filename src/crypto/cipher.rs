use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use zeroize::Zeroizing;

use crate::errors::{Result, StoreError};

pub const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 1 + NONCE_LEN;

/// 256-bit symmetric key. Wiped on drop.
pub struct SecretKey(Zeroizing<[u8; KEY_LEN]>);

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

impl SecretKey {
    /// Parse a 64-character hex key.
    ///
    /// # Errors
    /// `StoreError::Configuration` when empty, not hex, or not 32 bytes.
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(StoreError::Configuration("encryption key is empty".into()));
        }
        let bytes = Zeroizing::new(
            hex::decode(s)
                .map_err(|e| StoreError::Configuration(format!("encryption key is not hex: {e}")))?,
        );
        if bytes.len() != KEY_LEN {
            return Err(StoreError::Configuration(format!(
                "encryption key must be {KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(&bytes);
        Ok(Self(key))
    }

    /// Fresh random key from the OS RNG.
    ///
    /// # Errors
    /// `StoreError::Configuration` if the OS RNG is unavailable.
    pub fn generate() -> Result<Self> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        getrandom::fill(&mut *key)
            .map_err(|e| StoreError::Configuration(format!("rng: {e}")))?;
        Ok(Self(key))
    }

    #[must_use]
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(&*self.0))
    }
}

/// AES-256-GCM over whole blobs.
/// Layout: `version(1) | nonce(12) | ciphertext+tag`.
pub struct Cipher {
    aead: Aes256Gcm,
}

impl Cipher {
    /// # Errors
    /// `StoreError::Configuration` if the key length is rejected.
    pub fn new(key: &SecretKey) -> Result<Self> {
        let aead = Aes256Gcm::new_from_slice(&*key.0)
            .map_err(|e| StoreError::Configuration(format!("aes key: {e}")))?;
        Ok(Self { aead })
    }

    /// # Errors
    /// `StoreError::Encryption` on RNG or AEAD failure.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        getrandom::fill(&mut nonce_bytes)
            .map_err(|e| StoreError::Encryption(format!("nonce: {e}")))?;
        let ct = self
            .aead
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| StoreError::Encryption(format!("encrypt: {e}")))?;
        let mut out = Vec::with_capacity(HEADER_LEN + ct.len());
        out.push(crate::crypto::VERSION);
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ct);
        Ok(out)
    }

    /// # Errors
    /// `StoreError::Decryption` when the blob is short, has an unknown
    /// version, or fails authentication.
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>> {
        if blob.len() < HEADER_LEN + TAG_LEN {
            return Err(StoreError::Decryption(format!("ciphertext too short ({} bytes)", blob.len())));
        }
        if blob[0] != crate::crypto::VERSION {
            return Err(StoreError::Decryption(format!("unknown blob version {}", blob[0])));
        }
        let (nonce, ct) = blob[1..].split_at(NONCE_LEN);
        self.aead
            .decrypt(Nonce::from_slice(nonce), ct)
            .map_err(|_| StoreError::Decryption("bad token or wrong key".into()))
    }
}

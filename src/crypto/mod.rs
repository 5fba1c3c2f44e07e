//! Crypto engine: AES-256-GCM for stored blobs, Argon2id for passwords, and
//! SHA-256 identifiers derived from email addresses.

// Format version byte at the front of every encrypted blob
pub(crate) const VERSION: u8 = 1;

pub mod cipher;
pub mod password;
pub mod uid;

pub use cipher::{Cipher, SecretKey};
pub use password::{HashCost, hash_password, verify_password};
pub use uid::derive_uid;

use crate::errors::Result;
use crate::types::Uid;

/// The process-wide crypto state. The key is always injected by the caller;
/// nothing in here reads the environment.
pub struct CryptoEngine {
    cipher: Cipher,
    cost: HashCost,
}

impl std::fmt::Debug for CryptoEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoEngine").field("cost", &self.cost).finish_non_exhaustive()
    }
}

impl CryptoEngine {
    /// Build from a hex-encoded 32-byte key.
    ///
    /// # Errors
    /// `StoreError::Configuration` when the key is empty, not hex, or the wrong length.
    pub fn new(key_hex: &str) -> Result<Self> {
        Self::from_key(&SecretKey::from_hex(key_hex)?)
    }

    /// # Errors
    /// `StoreError::Configuration` if the cipher rejects the key.
    pub fn from_key(key: &SecretKey) -> Result<Self> {
        Ok(Self { cipher: Cipher::new(key)?, cost: HashCost::default() })
    }

    #[must_use]
    pub fn with_hash_cost(mut self, cost: HashCost) -> Self {
        self.cost = cost;
        self
    }

    #[must_use]
    pub fn hash_cost(&self) -> &HashCost {
        &self.cost
    }

    /// # Errors
    /// `StoreError::Encryption` if the AEAD or the RNG fails.
    pub fn encrypt(&self, blob: &[u8]) -> Result<Vec<u8>> {
        self.cipher.encrypt(blob)
    }

    /// # Errors
    /// `StoreError::Decryption` for malformed, foreign-key or tampered ciphertext.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.cipher.decrypt(ciphertext)
    }

    /// Hash with this engine's configured cost.
    ///
    /// # Errors
    /// `StoreError::PasswordHash` if the cost parameters are rejected.
    pub fn hash_password(&self, password: &str) -> Result<String> {
        hash_password(password, &self.cost)
    }

    /// # Errors
    /// `StoreError::PasswordHash` if `hash` is not a valid PHC string.
    pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
        verify_password(password, hash)
    }

    #[must_use]
    pub fn derive_uid(email: &str) -> Uid {
        derive_uid(email)
    }
}

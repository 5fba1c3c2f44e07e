use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, StoreError};

const SALT_LEN: usize = 16;

/// Argon2id work factor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashCost {
    pub t_cost: u32,     // iterations
    pub m_cost_kib: u32, // memory in KiB
    pub lanes: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self { t_cost: 8, m_cost_kib: 64 * 1024, lanes: 1 }
    }
}

impl HashCost {
    /// Smallest parameters argon2 accepts. Tests and benchmarks only.
    #[must_use]
    pub fn minimal() -> Self {
        Self { t_cost: 1, m_cost_kib: Params::MIN_M_COST, lanes: 1 }
    }
}

/// Salted Argon2id hash of `password`, as a PHC string.
///
/// # Errors
/// `StoreError::PasswordHash` if `cost` is out of range or the RNG fails.
pub fn hash_password(password: &str, cost: &HashCost) -> Result<String> {
    let params = Params::new(cost.m_cost_kib, cost.t_cost, cost.lanes, None)
        .map_err(|e| StoreError::PasswordHash(format!("argon2 params: {e}")))?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut salt = [0u8; SALT_LEN];
    getrandom::fill(&mut salt).map_err(|e| StoreError::PasswordHash(format!("salt: {e}")))?;
    let salt = SaltString::encode_b64(&salt)
        .map_err(|e| StoreError::PasswordHash(format!("salt: {e}")))?;
    argon
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| StoreError::PasswordHash(format!("argon2: {e}")))
}

/// Check `password` against a PHC string. Parameters come from the hash
/// itself; the comparison is constant-time.
///
/// # Errors
/// `StoreError::PasswordHash` if `hash` cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| StoreError::PasswordHash(format!("invalid hash format: {e}")))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(StoreError::PasswordHash(format!("argon2: {e}"))),
    }
}

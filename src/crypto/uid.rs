use sha2::{Digest, Sha256};

use crate::types::Uid;

/// Hex SHA-256 of the raw email bytes. No case folding or trimming:
/// `A@x.com` and `a@x.com` are different identities.
#[must_use]
pub fn derive_uid(email: &str) -> Uid {
    Uid::from_digest(hex::encode(Sha256::digest(email.as_bytes())))
}

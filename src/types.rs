use std::fmt;

/// Byte position of a record's length prefix inside the record log.
pub type Offset = u64;

/// Size of the big-endian length prefix in front of every record.
pub const LEN_PREFIX: u64 = 4;

/// Hex SHA-256 digest of an email address; the index key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uid(String);

impl Uid {
    /// Wraps an already-derived digest, e.g. one read back from the index file.
    /// Returns `None` unless `s` is 64 lowercase hex characters.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let ok = s.len() == 64 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        ok.then(|| Self(s.to_string()))
    }

    pub(crate) fn from_digest(hex: String) -> Self {
        Self(hex)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

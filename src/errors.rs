use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("Password hash error: {0}")]
    PasswordHash(String),

    #[error("Corrupt record at offset {offset}: {reason}")]
    CorruptRecord { offset: u64, reason: String },

    #[error("Corrupt index at line {line}: {reason}")]
    CorruptIndex { line: usize, reason: String },

    #[error("Index entry for {uid} points at offset {offset}, which is not a record")]
    DanglingOffset { uid: String, offset: u64 },

    #[error("Record too large: {0} bytes")]
    RecordTooLarge(usize),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// True for failures that `verify` reports as an invalid credential.
    #[must_use]
    pub fn is_credential_failure(&self) -> bool {
        matches!(self, Self::Decryption(_) | Self::PasswordHash(_))
    }
}

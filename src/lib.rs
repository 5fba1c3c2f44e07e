//! HashFlog: an append-only encrypted credential store.
//!
//! Registrations are Argon2id hashes, encrypted with AES-256-GCM and appended
//! to a length-prefixed binary log. A text index maps each email's SHA-256 uid
//! to the offset of its latest record. Compaction rewrites both files keeping
//! one record per uid.

pub mod cli;
pub mod compactor;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod fsutil;
pub mod index;
pub mod lock;
pub mod logger;
pub mod record_log;
pub mod store;
pub mod types;

pub use compactor::{CompactionReport, compact};
pub use config::{StoreConfig, StorePaths};
pub use crypto::{CryptoEngine, HashCost};
pub use errors::{Result, StoreError};
pub use store::CredentialStore;
pub use types::{Offset, Uid};

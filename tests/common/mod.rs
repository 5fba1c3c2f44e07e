#![allow(dead_code)]
// Shared helpers for integration tests
use hashflog::{CredentialStore, CryptoEngine, HashCost, StorePaths};
use std::path::Path;

pub const TEST_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
pub const OTHER_KEY: &str = "ffeeddccbbaa99887766554433221100ffeeddccbbaa99887766554433221100";

pub fn engine(key: &str) -> CryptoEngine {
    CryptoEngine::new(key).unwrap().with_hash_cost(HashCost::minimal())
}

pub fn open_store(dir: &Path) -> CredentialStore {
    CredentialStore::open(StorePaths::in_dir(dir), engine(TEST_KEY)).unwrap()
}

/// Number of lines in the on-disk index.
pub fn index_lines(paths: &StorePaths) -> usize {
    std::fs::read_to_string(&paths.index).unwrap().lines().count()
}

/// Number of physical records in the on-disk log.
pub fn log_records(paths: &StorePaths) -> usize {
    hashflog::record_log::RecordLog::open(&paths.log).unwrap().scan().unwrap().map(|r| r.unwrap()).count()
}

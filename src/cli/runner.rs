use log::error;
use serde_json::{Value, json};

use super::command::Command;
use crate::compactor;
use crate::config::{StoreConfig, StorePaths};
use crate::crypto::{CryptoEngine, HashCost, SecretKey};
use crate::errors::{Result, StoreError};
use crate::store::CredentialStore;

/// Everything a command needs besides its own arguments.
#[derive(Debug, Clone)]
pub struct Context {
    pub paths: StorePaths,
    pub hash_cost: HashCost,
    /// Hex key; only register/verify require it.
    pub key: Option<String>,
}

impl Context {
    #[must_use]
    pub fn from_config(cfg: &StoreConfig, key: Option<String>) -> Self {
        Self { paths: cfg.paths(), hash_cost: cfg.hash_cost.clone(), key }
    }

    fn open_store(&self) -> Result<CredentialStore> {
        let key = self
            .key
            .as_deref()
            .ok_or_else(|| StoreError::Configuration(format!("{} not set", crate::config::KEY_ENV)))?;
        let crypto = CryptoEngine::new(key)?.with_hash_cost(self.hash_cost.clone());
        CredentialStore::open(self.paths.clone(), crypto)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub json: Value,
    pub exit_code: i32,
}

impl Outcome {
    fn ok(json: Value) -> Self {
        Self { json, exit_code: 0 }
    }

    fn fail(json: Value) -> Self {
        Self { json, exit_code: 1 }
    }
}

pub fn run(ctx: &Context, cmd: Command) -> Outcome {
    let name = cmd.name();
    match cmd {
        Command::Register { email, password } => {
            match ctx.open_store().and_then(|s| s.register(&email, &password)) {
                Ok(()) => Outcome::ok(json!({"status": "ok"})),
                Err(e) => {
                    error!("{name} failed: {e}");
                    Outcome::fail(json!({"status": "error", "msg": e.to_string()}))
                }
            }
        }
        Command::Verify { email, password } => {
            match ctx.open_store().and_then(|s| s.verify(&email, &password)) {
                Ok(true) => Outcome::ok(json!({"valid": true})),
                Ok(false) => Outcome::fail(json!({"valid": false})),
                Err(e) => {
                    error!("{name} failed: {e}");
                    Outcome::fail(json!({"valid": false, "msg": e.to_string()}))
                }
            }
        }
        Command::Compact => match compactor::compact(&ctx.paths) {
            Ok(r) => Outcome::ok(json!({
                "status": "ok",
                "records_before": r.records_before,
                "records_after": r.records_after,
                "bytes_before": r.bytes_before,
                "bytes_after": r.bytes_after,
            })),
            Err(e) => {
                error!("{name} failed: {e}");
                Outcome::fail(json!({"status": "error", "msg": e.to_string()}))
            }
        },
        Command::Keygen => match SecretKey::generate() {
            Ok(k) => Outcome::ok(json!({"key": k.to_hex().as_str()})),
            Err(e) => Outcome::fail(json!({"status": "error", "msg": e.to_string()})),
        },
    }
}

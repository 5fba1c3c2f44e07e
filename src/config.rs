//! Store configuration and file layout.
//!
//! Precedence: explicit overrides > config file > environment > defaults.
//! The encryption key never lives in the config file; callers provision it
//! separately (see [`key_from_env`]) and hand it to the crypto engine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::HashCost;
use crate::errors::{Result, StoreError};

pub const KEY_ENV: &str = "FILE_ENCRYPTION_KEY";
pub const CONFIG_ENV: &str = "HASHFLOG_CONFIG";
pub const DATA_DIR_ENV: &str = "HASHFLOG_DATA_DIR";
pub const CONFIG_FILE_NAME: &str = "hashflog.toml";

/// Canonical and staging locations of the two store files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub log: PathBuf,
    pub index: PathBuf,
}

impl StorePaths {
    /// `users.log` / `users.idx` inside `dir`.
    #[must_use]
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self { log: dir.join("users.log"), index: dir.join("users.idx") }
    }

    #[must_use]
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(log: P, index: Q) -> Self {
        Self { log: log.as_ref().to_path_buf(), index: index.as_ref().to_path_buf() }
    }

    /// Compaction output for the log: `users.log` -> `users.new.log`.
    #[must_use]
    pub fn staging_log(&self) -> PathBuf {
        staging(&self.log)
    }

    /// Compaction output for the index: `users.idx` -> `users.new.idx`.
    #[must_use]
    pub fn staging_index(&self) -> PathBuf {
        staging(&self.index)
    }

    /// Advisory lock file serialising writers: `users.idx` -> `users.lock`.
    #[must_use]
    pub fn lock(&self) -> PathBuf {
        self.index.with_extension("lock")
    }

    /// Directory holding the log, for fsync after renames.
    #[must_use]
    pub fn log_dir(&self) -> &Path {
        parent_or_cwd(&self.log)
    }

    #[must_use]
    pub fn index_dir(&self) -> &Path {
        parent_or_cwd(&self.index)
    }
}

fn parent_or_cwd(p: &Path) -> &Path {
    match p.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    }
}

fn staging(p: &Path) -> PathBuf {
    let stem = p.file_stem().and_then(|s| s.to_str()).unwrap_or("store");
    let name = match p.extension().and_then(|s| s.to_str()) {
        Some(ext) => format!("{stem}.new.{ext}"),
        None => format!("{stem}.new"),
    };
    p.with_file_name(name)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub log_file: String,
    pub index_file: String,
    pub hash_cost: HashCost,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            log_file: "users.log".into(),
            index_file: "users.idx".into(),
            hash_cost: HashCost::default(),
        }
    }
}

/// Partial view of a config file; absent keys fall through to env/defaults.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    data_dir: Option<PathBuf>,
    log_file: Option<String>,
    index_file: Option<String>,
    hash_cost: Option<HashCost>,
}

impl StoreConfig {
    #[must_use]
    pub fn paths(&self) -> StorePaths {
        StorePaths::new(self.data_dir.join(&self.log_file), self.data_dir.join(&self.index_file))
    }

    /// Parse a TOML document, filling gaps from defaults.
    ///
    /// # Errors
    /// `StoreError::Configuration` on invalid TOML.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| StoreError::Configuration(format!("config: {e}")))
    }

    /// Resolve configuration. `explicit` is a config file named on the
    /// command line; `data_dir` overrides everything else.
    ///
    /// # Errors
    /// `StoreError::Configuration` if an explicitly named file is missing or
    /// any config file fails to parse.
    pub fn load(explicit: Option<&Path>, data_dir: Option<&Path>) -> Result<Self> {
        let mut cfg = Self::default();
        let env_dir = std::env::var_os(DATA_DIR_ENV).map(PathBuf::from);

        if let Some(p) = explicit
            && !p.exists()
        {
            return Err(StoreError::Configuration(format!("config file not found: {}", p.display())));
        }
        let file = match candidate_paths(explicit).into_iter().find(|p| p.exists()) {
            Some(p) => {
                let s = std::fs::read_to_string(&p).map_err(|e| {
                    StoreError::Configuration(format!("reading {}: {e}", p.display()))
                })?;
                toml::from_str::<FileConfig>(&s).map_err(|e| {
                    StoreError::Configuration(format!("parsing {}: {e}", p.display()))
                })?
            }
            None => FileConfig::default(),
        };

        if let Some(d) = data_dir.map(Path::to_path_buf).or(file.data_dir).or(env_dir) {
            cfg.data_dir = d;
        }
        if let Some(f) = file.log_file {
            cfg.log_file = f;
        }
        if let Some(f) = file.index_file {
            cfg.index_file = f;
        }
        if let Some(c) = file.hash_cost {
            cfg.hash_cost = c;
        }
        Ok(cfg)
    }
}

/// Config files in search order; the first existing one is used.
fn candidate_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(p) = explicit {
        paths.push(p.to_path_buf());
    }
    if let Some(p) = std::env::var_os(CONFIG_ENV) {
        paths.push(PathBuf::from(p));
    }
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join(CONFIG_FILE_NAME));
    }
    if let Some(dir) = dirs_next::config_dir() {
        paths.push(dir.join("hashflog").join(CONFIG_FILE_NAME));
    }
    paths
}

/// Read the hex encryption key from `FILE_ENCRYPTION_KEY`.
///
/// # Errors
/// `StoreError::Configuration` when the variable is unset or empty.
pub fn key_from_env() -> Result<String> {
    match std::env::var(KEY_ENV) {
        Ok(k) if !k.trim().is_empty() => Ok(k),
        _ => Err(StoreError::Configuration(format!("{KEY_ENV} not set"))),
    }
}

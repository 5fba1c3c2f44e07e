use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};

use crate::compactor::{self, CompactionReport};
use crate::config::StorePaths;
use crate::crypto::CryptoEngine;
use crate::errors::{Result, StoreError};
use crate::fsutil;
use crate::index::{IndexFile, OffsetMap};
use crate::lock::StoreLock;
use crate::record_log::RecordLog;
use crate::types::{LEN_PREFIX, Uid};

const AUDIT: &str = "hashflog::audit";

/// Byte lengths of the two files as last seen by this store. Any other
/// writer (another process, a standalone compaction) changes at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileLens {
    log: u64,
    index: u64,
}

#[derive(Debug)]
struct View {
    map: OffsetMap,
    lens: FileLens,
}

enum Lookup {
    Found(Vec<u8>),
    Missing,
    /// The files changed under the in-memory view.
    Stale,
}

/// Email/password registrations over an append-only log and its index.
///
/// `register` calls are serialised in-process by the writer mutex and across
/// processes by the `users.lock` file lock, both held over the two appends.
/// `verify` reads optimistically under the view's read lock and falls back
/// to a locked reload when another writer has touched the files. Password
/// checking always runs unlocked.
pub struct CredentialStore {
    crypto: CryptoEngine,
    paths: StorePaths,
    log: RecordLog,
    lock: StoreLock,
    writer: Mutex<IndexFile>,
    view: RwLock<View>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("paths", &self.paths)
            .field("identities", &self.view.read().map.len())
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Open (or create) the store at `paths`, finishing any interrupted
    /// compaction, cutting off a torn final record, and loading the whole
    /// index into memory.
    ///
    /// # Errors
    /// I/O errors, `CorruptIndex`, `CorruptRecord` if an indexed record is
    /// unreadable, or `DanglingOffset` if an index entry points beyond the
    /// end of the log.
    pub fn open(paths: StorePaths, crypto: CryptoEngine) -> Result<Self> {
        for dir in [paths.log_dir(), paths.index_dir()] {
            std::fs::create_dir_all(dir)?;
        }
        let lock = StoreLock::open(&paths.lock())?;
        let log = RecordLog::open(&paths.log)?;
        let (file, view) = {
            let _guard = lock.lock()?;
            load_locked(&paths, &log)?
        };
        info!("opened credential store {} ({} identities)", paths.log.display(), view.map.len());
        Ok(Self { crypto, paths, log, lock, writer: Mutex::new(file), view: RwLock::new(view) })
    }

    #[must_use]
    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Number of distinct identities currently registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.view.read().map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add or replace the credential for `email`. Re-registering is not an
    /// error; the new record supersedes the old one.
    ///
    /// # Errors
    /// Hashing, encryption or I/O failures. If the log append succeeds but the
    /// index append fails, the record is orphaned and the old credential
    /// stays in effect.
    pub fn register(&self, email: &str, password: &str) -> Result<()> {
        let uid = CryptoEngine::derive_uid(email);
        let hash = self.crypto.hash_password(password)?;
        let cipher = self.crypto.encrypt(hash.as_bytes())?;

        let mut writer = self.writer.lock();
        let guard = self.lock.lock()?;
        self.sync_locked(&mut writer)?;
        let offset = self.log.append(&cipher)?;
        writer.append(&uid, offset)?;
        let lens = self.disk_lens()?;
        let superseded = {
            let mut view = self.view.write();
            view.lens = lens;
            view.map.insert(uid.clone(), offset)
        };
        drop(guard);
        drop(writer);

        match superseded {
            Some(old) => info!(target: AUDIT, "register uid={uid} offset={offset} supersedes={old}"),
            None => info!(target: AUDIT, "register uid={uid} offset={offset}"),
        }
        Ok(())
    }

    /// True iff `password` matches the current credential for `email`.
    /// Unknown emails and undecryptable records are `false`, not errors.
    ///
    /// # Errors
    /// Only I/O failures and corrupt length prefixes.
    pub fn verify(&self, email: &str, password: &str) -> Result<bool> {
        let uid = CryptoEngine::derive_uid(email);
        let lookup = match self.read_current(&uid)? {
            Lookup::Stale => self.read_current_locked(&uid)?,
            found => found,
        };
        let Lookup::Found(cipher) = lookup else {
            info!(target: AUDIT, "verify uid={uid} result=unknown");
            return Ok(false);
        };
        let ok = match self.check(&cipher, password) {
            Ok(ok) => ok,
            Err(e) if e.is_credential_failure() => {
                warn!("record for uid={uid} is unusable: {e}");
                false
            }
            Err(e) => return Err(e),
        };
        info!(target: AUDIT, "verify uid={uid} result={}", if ok { "valid" } else { "invalid" });
        Ok(ok)
    }

    /// Lookup and read against the current view. Reports `Stale` if the file
    /// lengths did not match the view both before and after the read.
    fn read_current(&self, uid: &Uid) -> Result<Lookup> {
        let view = self.view.read();
        if self.disk_lens()? != view.lens {
            return Ok(Lookup::Stale);
        }
        let Some(offset) = view.map.get(uid) else {
            return Ok(Lookup::Missing);
        };
        let cipher = self.log.read_at(offset);
        if self.disk_lens()? != view.lens {
            return Ok(Lookup::Stale);
        }
        cipher.map(Lookup::Found)
    }

    fn read_current_locked(&self, uid: &Uid) -> Result<Lookup> {
        let mut writer = self.writer.lock();
        let _guard = self.lock.lock()?;
        self.sync_locked(&mut writer)?;
        let view = self.view.read();
        match view.map.get(uid) {
            Some(offset) => self.log.read_at(offset).map(Lookup::Found),
            None => Ok(Lookup::Missing),
        }
    }

    fn check(&self, cipher: &[u8], password: &str) -> Result<bool> {
        let hash = self.crypto.decrypt(cipher)?;
        let hash = String::from_utf8(hash)
            .map_err(|_| StoreError::Decryption("record is not a UTF-8 hash".into()))?;
        CryptoEngine::verify_password(password, &hash)
    }

    fn disk_lens(&self) -> Result<FileLens> {
        Ok(FileLens { log: self.log.len()?, index: fsutil::len_or_zero(&self.paths.index)? })
    }

    /// Reload the view if another writer changed the files. Caller holds the
    /// writer mutex and the store lock.
    fn sync_locked(&self, writer: &mut IndexFile) -> Result<()> {
        if self.disk_lens()? == self.view.read().lens {
            return Ok(());
        }
        let (file, view) = load_locked(&self.paths, &self.log)?;
        debug!("reloaded {} index entries after an external write", view.map.len());
        *writer = file;
        *self.view.write() = view;
        Ok(())
    }

    /// Compact the underlying files while holding exclusive access, then
    /// reload the in-memory mapping from the rewritten index.
    ///
    /// # Errors
    /// Anything [`compactor::compact`] returns. The mapping is reloaded from
    /// disk even on failure so it never points into a replaced log.
    pub fn compact(&self) -> Result<CompactionReport> {
        let mut writer = self.writer.lock();
        let _guard = self.lock.lock()?;
        let mut view = self.view.write();
        let result = compactor::compact_locked(&self.paths);
        let (file, fresh) = load_locked(&self.paths, &self.log)?;
        debug!("reloaded {} index entries after compaction", fresh.map.len());
        *writer = file;
        *view = fresh;
        result
    }
}

/// Bring the files to a consistent state and load the index. Caller holds
/// the store lock.
fn load_locked(paths: &StorePaths, log: &RecordLog) -> Result<(IndexFile, View)> {
    compactor::recover(paths)?;
    let (file, map) = IndexFile::open(&paths.index)?;
    repair_log_tail(log, &map)?;
    let log_len = log.len()?;
    validate(&map, log_len)?;
    let lens = FileLens { log: log_len, index: fsutil::len_or_zero(&paths.index)? };
    Ok((file, View { map, lens }))
}

/// Cut off a record torn by a crash mid-append, unless something indexed
/// lives at or after it.
fn repair_log_tail(log: &RecordLog, map: &OffsetMap) -> Result<()> {
    let on_disk = log.len()?;
    let complete = log.complete_len()?;
    if complete == on_disk {
        return Ok(());
    }
    if let Some((uid, offset)) = map.iter().find(|&(_, off)| off >= complete) {
        return Err(StoreError::CorruptRecord {
            offset: complete,
            reason: format!("unreadable record before offset {offset} indexed for {uid}"),
        });
    }
    warn!("truncating torn tail of {} from {on_disk} to {complete} bytes", log.path().display());
    log.truncate(complete)
}

/// Every offset must leave room for at least a length prefix.
fn validate(map: &OffsetMap, log_len: u64) -> Result<()> {
    for (uid, offset) in map.iter() {
        if offset + LEN_PREFIX > log_len {
            return Err(StoreError::DanglingOffset { uid: uid.to_string(), offset });
        }
    }
    Ok(())
}

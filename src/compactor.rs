//! Offline compaction: rewrite log + index keeping one record per uid.
//!
//! Both outputs are written to staging files and fsynced, then renamed over
//! the canonical names, log first and index second. [`recover`] turns any
//! state a crash can leave behind back into a consistent pair.

use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::{info, warn};
use serde::Serialize;

use crate::config::StorePaths;
use crate::errors::{Result, StoreError};
use crate::fsutil;
use crate::index::{self, OffsetMap, write_entry};
use crate::lock::StoreLock;
use crate::record_log::{RecordLog, write_record};
use crate::types::{LEN_PREFIX, Offset};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompactionReport {
    pub records_before: usize,
    pub records_after: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

/// What [`recover`] found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// No staging files.
    Clean,
    /// A compaction died before its first rename; its output was deleted.
    DiscardedStaging,
    /// A compaction died between the two renames; the index rename was finished.
    CompletedSwap,
}

/// Bring the store files back to a consistent pair after an interrupted
/// compaction.
///
/// # Errors
/// Any I/O error from removing or renaming staging files.
pub fn recover(paths: &StorePaths) -> Result<Recovery> {
    let staging_log = paths.staging_log();
    let staging_idx = paths.staging_index();
    match (staging_log.exists(), staging_idx.exists()) {
        (false, false) => Ok(Recovery::Clean),
        (true, _) => {
            warn!("discarding unfinished compaction output {}", staging_log.display());
            fsutil::remove_if_exists(&staging_log)?;
            fsutil::remove_if_exists(&staging_idx)?;
            Ok(Recovery::DiscardedStaging)
        }
        (false, true) => {
            warn!("log was swapped but index was not; finishing rename of {}", staging_idx.display());
            fs::rename(&staging_idx, &paths.index)?;
            fsutil::sync_dir(paths.index_dir())?;
            Ok(Recovery::CompletedSwap)
        }
    }
}

/// Compact the store at `paths`, holding the store lock for the whole pass
/// so no `register` in any process can append meanwhile.
///
/// # Errors
/// I/O errors, `CorruptRecord` from the scan, `CorruptIndex` from replay, or
/// `DanglingOffset` if the index names an offset the log does not contain.
/// On error before the renames the canonical files are untouched.
pub fn compact(paths: &StorePaths) -> Result<CompactionReport> {
    let lock = StoreLock::open(&paths.lock())?;
    let _guard = lock.lock()?;
    compact_locked(paths)
}

/// [`compact`] for callers that already hold the store lock.
///
/// # Errors
/// As [`compact`].
pub(crate) fn compact_locked(paths: &StorePaths) -> Result<CompactionReport> {
    recover(paths)?;

    // 1. uid -> latest offset
    let live = index::load(&paths.index)?.map;

    // 2. offset -> (blob start, blob length)
    let log = RecordLog::open(&paths.log)?;
    let bytes_before = log.len()?;
    let mut spans: HashMap<Offset, (u64, usize)> = HashMap::new();
    for item in log.scan()? {
        match item {
            Ok((offset, blob)) => {
                spans.insert(offset, (offset + LEN_PREFIX, blob.len()));
            }
            // a record torn by a crashed append; nothing indexed can point past it
            Err(StoreError::CorruptRecord { offset, reason }) => {
                if let Some((uid, _)) = live.iter().find(|&(_, off)| off >= offset) {
                    return Err(StoreError::CorruptRecord {
                        offset,
                        reason: format!("{reason}; still indexed by {uid}"),
                    });
                }
                warn!("dropping torn record at offset {offset}: {reason}");
                break;
            }
            Err(e) => return Err(e),
        }
    }
    let records_before = spans.len();

    // 3. copy live records into staging files
    let staging_log = paths.staging_log();
    let staging_idx = paths.staging_index();
    let bytes_after = match write_staging(&log, &live, &spans, &staging_log, &staging_idx) {
        Ok(n) => n,
        Err(e) => {
            let _ = fsutil::remove_if_exists(&staging_log);
            let _ = fsutil::remove_if_exists(&staging_idx);
            return Err(e);
        }
    };

    // 4. swap in, log first
    fs::rename(&staging_log, &paths.log)?;
    fsutil::sync_dir(paths.log_dir())?;
    fs::rename(&staging_idx, &paths.index)?;
    fsutil::sync_dir(paths.index_dir())?;

    let report = CompactionReport { records_before, records_after: live.len(), bytes_before, bytes_after };
    info!(
        "compaction complete: records {} -> {}, bytes {} -> {}",
        report.records_before, report.records_after, report.bytes_before, report.bytes_after
    );
    Ok(report)
}

fn write_staging(
    log: &RecordLog,
    live: &OffsetMap,
    spans: &HashMap<Offset, (u64, usize)>,
    staging_log: &Path,
    staging_idx: &Path,
) -> Result<u64> {
    let mut log_out = BufWriter::new(fsutil::create_truncate_secure(staging_log)?);
    let mut idx_out = BufWriter::new(fsutil::create_truncate_secure(staging_idx)?);
    let mut reader = log.span_reader()?;
    let mut pos: u64 = 0;
    for (uid, old) in live.iter() {
        let &(start, len) = spans
            .get(&old)
            .ok_or_else(|| StoreError::DanglingOffset { uid: uid.to_string(), offset: old })?;
        let blob = reader.read_span(start, len)?;
        write_record(&mut log_out, &blob)?;
        write_entry(&mut idx_out, uid, pos)?;
        pos += LEN_PREFIX + len as u64;
    }
    log_out.flush()?;
    log_out.get_ref().sync_all()?;
    idx_out.flush()?;
    idx_out.get_ref().sync_all()?;
    Ok(pos)
}

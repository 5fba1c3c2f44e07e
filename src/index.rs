//! Identity index: `uid -> offset` of the latest record for that uid.
//!
//! On disk it is an append-only text log, one `"<uid> <offset>\n"` line per
//! registration. In memory only the latest offset per uid is kept. Replay is
//! a plain fold over lines, so it can be tested without a store.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use log::warn;

use crate::errors::{Result, StoreError};
use crate::fsutil;
use crate::types::{Offset, Uid};

/// Latest offset per uid, iterated in the order each uid was first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetMap {
    offsets: HashMap<Uid, Offset>,
    order: Vec<Uid>,
}

impl OffsetMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last write wins. Returns the superseded offset, if any.
    pub fn insert(&mut self, uid: Uid, offset: Offset) -> Option<Offset> {
        if let Some(slot) = self.offsets.get_mut(&uid) {
            return Some(std::mem::replace(slot, offset));
        }
        self.order.push(uid.clone());
        self.offsets.insert(uid, offset);
        None
    }

    #[must_use]
    pub fn get(&self, uid: &Uid) -> Option<Offset> {
        self.offsets.get(uid).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Uid, Offset)> + '_ {
        self.order.iter().map(|uid| (uid, self.offsets[uid]))
    }
}

/// Result of folding an index file.
#[derive(Debug, Default)]
pub struct Replay {
    pub map: OffsetMap,
    /// Bytes covered by complete, newline-terminated lines.
    pub valid_len: u64,
    /// Number of entry lines read, including superseded ones.
    pub lines: usize,
}

#[must_use]
pub fn format_line(uid: &Uid, offset: Offset) -> String {
    format!("{uid} {offset}\n")
}

fn parse_line(line: &str) -> std::result::Result<(Uid, Offset), String> {
    let (uid, off) = line.split_once(' ').ok_or("missing separator")?;
    let uid = Uid::parse(uid).ok_or_else(|| format!("bad uid {uid:?}"))?;
    let off = off.parse::<Offset>().map_err(|e| format!("bad offset {off:?}: {e}"))?;
    Ok((uid, off))
}

/// Fold index lines into a map, later lines overwriting earlier ones.
///
/// An unterminated final line is a torn append and is left out of the map
/// and of `valid_len`.
///
/// # Errors
/// `CorruptIndex` for any complete line that does not parse.
pub fn replay<R: BufRead>(mut reader: R) -> Result<Replay> {
    let mut out = Replay::default();
    let mut buf = Vec::new();
    let mut line_no = 0;
    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf)?;
        if n == 0 {
            break;
        }
        line_no += 1;
        if buf.last() != Some(&b'\n') {
            warn!("ignoring torn index line {line_no} ({n} bytes)");
            break;
        }
        let text = std::str::from_utf8(&buf[..n - 1])
            .map_err(|e| StoreError::CorruptIndex { line: line_no, reason: e.to_string() })?;
        let (uid, offset) =
            parse_line(text).map_err(|reason| StoreError::CorruptIndex { line: line_no, reason })?;
        out.map.insert(uid, offset);
        out.valid_len += n as u64;
        out.lines += 1;
    }
    Ok(out)
}

/// Replay the index file at `path`. A missing file is an empty index.
///
/// # Errors
/// I/O errors or `CorruptIndex`.
pub fn load(path: &Path) -> Result<Replay> {
    match File::open(path) {
        Ok(f) => replay(BufReader::new(f)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Replay::default()),
        Err(e) => Err(e.into()),
    }
}

/// Write one entry line.
///
/// # Errors
/// Any I/O error.
pub fn write_entry<W: Write>(writer: &mut W, uid: &Uid, offset: Offset) -> Result<()> {
    writer.write_all(format_line(uid, offset).as_bytes())?;
    Ok(())
}

/// Appender for the on-disk index.
#[derive(Debug)]
pub struct IndexFile {
    path: PathBuf,
}

impl IndexFile {
    /// Open (creating if needed) and return the file with its replayed map.
    /// A torn final line is cut off so the next append starts on a fresh line.
    ///
    /// # Errors
    /// I/O errors or `CorruptIndex`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<(Self, OffsetMap)> {
        let path = path.as_ref().to_path_buf();
        fsutil::touch_secure(&path)?;
        let replay = load(&path)?;
        let on_disk = fsutil::len_or_zero(&path)?;
        if replay.valid_len < on_disk {
            warn!(
                "truncating torn tail of {} from {on_disk} to {} bytes",
                path.display(),
                replay.valid_len
            );
            let f = OpenOptions::new().write(true).open(&path)?;
            f.set_len(replay.valid_len)?;
            f.sync_data()?;
        }
        Ok((Self { path }, replay.map))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line and sync it. A failed write is truncated away so the
    /// next line still starts on a fresh line. Callers must hold the store lock.
    ///
    /// # Errors
    /// Any I/O error.
    pub fn append(&self, uid: &Uid, offset: Offset) -> Result<()> {
        let mut f = fsutil::open_append_secure(&self.path)?;
        fsutil::append_or_rollback(&mut f, |f| {
            write_entry(f, uid, offset)?;
            f.sync_data()?;
            Ok(())
        })?;
        Ok(())
    }
}

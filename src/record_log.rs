//! Append-only binary log of length-prefixed blobs.
//!
//! Each record is a `u32` big-endian length followed by that many bytes. There
//! is no header, checksum or magic; the blobs carry their own authentication.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::errors::{Result, StoreError};
use crate::fsutil;
use crate::types::{LEN_PREFIX, Offset};

/// Write one record (prefix + blob) to `writer`.
///
/// # Errors
/// `RecordTooLarge` if the blob does not fit a `u32` prefix, or any I/O error.
pub fn write_record<W: Write>(writer: &mut W, blob: &[u8]) -> Result<()> {
    let len = u32::try_from(blob.len()).map_err(|_| StoreError::RecordTooLarge(blob.len()))?;
    let mut buf = Vec::with_capacity(blob.len() + 4);
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(blob);
    writer.write_all(&buf)?;
    Ok(())
}

/// Read one record starting at the reader's position. `offset` is only used
/// for error reporting. Returns `None` on a clean end of file.
///
/// # Errors
/// `CorruptRecord` for a partial prefix or truncated body.
pub fn read_record<R: Read>(reader: &mut R, offset: Offset) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        match reader.read(&mut len_buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    match filled {
        0 => return Ok(None),
        4 => {}
        n => {
            return Err(StoreError::CorruptRecord {
                offset,
                reason: format!("partial length prefix ({n} of 4 bytes)"),
            });
        }
    }
    // Bounded by what the reader actually holds, never by the prefix alone
    let len = u32::from_be_bytes(len_buf);
    let mut blob = Vec::new();
    reader.by_ref().take(u64::from(len)).read_to_end(&mut blob)?;
    if blob.len() as u64 != u64::from(len) {
        return Err(StoreError::CorruptRecord {
            offset,
            reason: format!("truncated body, expected {len} bytes, found {}", blob.len()),
        });
    }
    Ok(Some(blob))
}

#[derive(Debug, Clone)]
pub struct RecordLog {
    path: PathBuf,
}

impl RecordLog {
    /// Open the log at `path`, creating an empty one if needed.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fsutil::touch_secure(&path)?;
        Ok(Self { path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size of the log in bytes.
    ///
    /// # Errors
    /// Returns an I/O error if metadata cannot be read.
    pub fn len(&self) -> Result<u64> {
        Ok(fsutil::len_or_zero(&self.path)?)
    }

    /// # Errors
    /// Returns an I/O error if metadata cannot be read.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Append `blob` and return the offset of its length prefix, taken from
    /// the file length at the time of the write. The data is synced before
    /// returning; a failed write is truncated away. Callers must hold the
    /// store lock.
    ///
    /// # Errors
    /// `RecordTooLarge` or any I/O error.
    pub fn append(&self, blob: &[u8]) -> Result<Offset> {
        let mut f = fsutil::open_append_secure(&self.path)?;
        fsutil::append_or_rollback(&mut f, |f| {
            write_record(f, blob)?;
            f.sync_data()?;
            Ok(())
        })
    }

    /// Length of the prefix of the log made of complete records. Anything
    /// after it is a record torn by a crash mid-append.
    ///
    /// # Errors
    /// I/O errors other than a truncated record.
    pub fn complete_len(&self) -> Result<u64> {
        let mut end = 0;
        for item in self.scan()? {
            match item {
                Ok((offset, blob)) => end = offset + LEN_PREFIX + blob.len() as u64,
                Err(StoreError::CorruptRecord { .. }) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(end)
    }

    /// Cut the log back to `len` bytes. Callers must hold the store lock.
    ///
    /// # Errors
    /// Any I/O error.
    pub fn truncate(&self, len: u64) -> Result<()> {
        let f = OpenOptions::new().write(true).open(&self.path)?;
        f.set_len(len)?;
        f.sync_data()?;
        Ok(())
    }

    /// Read the record whose prefix starts at `offset`. Only offsets handed
    /// out by `append` or `scan` are meaningful.
    ///
    /// # Errors
    /// `CorruptRecord` if the offset is past the end or the record is truncated.
    pub fn read_at(&self, offset: Offset) -> Result<Vec<u8>> {
        let mut f = File::open(&self.path)?;
        f.seek(SeekFrom::Start(offset))?;
        read_record(&mut f, offset)?.ok_or_else(|| StoreError::CorruptRecord {
            offset,
            reason: "offset is at or past end of log".into(),
        })
    }

    /// A single open handle for many positional reads.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be opened.
    pub fn span_reader(&self) -> Result<SpanReader> {
        Ok(SpanReader { file: File::open(&self.path)? })
    }

    /// Iterate every record in file order. Each call starts from the beginning.
    /// A missing file scans as empty.
    ///
    /// # Errors
    /// Returns an I/O error if the file exists but cannot be opened.
    pub fn scan(&self) -> Result<RecordIter> {
        let reader = match File::open(&self.path) {
            Ok(f) => Some(BufReader::new(f)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        Ok(RecordIter { reader, pos: 0 })
    }
}

pub struct SpanReader {
    file: File,
}

impl SpanReader {
    /// # Errors
    /// `CorruptRecord` if fewer than `len` bytes remain.
    pub fn read_span(&mut self, start: u64, len: usize) -> Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(start))?;
        let mut blob = vec![0u8; len];
        self.file.read_exact(&mut blob).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => StoreError::CorruptRecord {
                offset: start.saturating_sub(LEN_PREFIX),
                reason: format!("truncated body, expected {len} bytes"),
            },
            _ => e.into(),
        })?;
        Ok(blob)
    }
}

/// Lazy iterator returned by [`RecordLog::scan`]. Stops after the first error.
pub struct RecordIter {
    reader: Option<BufReader<File>>,
    pos: Offset,
}

impl Iterator for RecordIter {
    type Item = Result<(Offset, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;
        let offset = self.pos;
        match read_record(reader, offset) {
            Ok(Some(blob)) => {
                self.pos += LEN_PREFIX + blob.len() as u64;
                Some(Ok((offset, blob)))
            }
            Ok(None) => {
                self.reader = None;
                None
            }
            Err(e) => {
                self.reader = None;
                Some(Err(e))
            }
        }
    }
}

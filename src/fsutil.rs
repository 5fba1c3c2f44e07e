use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

use log::warn;

use crate::errors::Result;

fn secure_options() -> OpenOptions {
    #[allow(unused_mut)]
    let mut opts = OpenOptions::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    opts
}

/// Open `path` for appending, creating it owner-only (0o600 on Unix) if missing.
///
/// # Errors
/// Returns an error if the file cannot be created/opened.
pub fn open_append_secure(path: &Path) -> io::Result<File> {
    secure_options().append(true).create(true).open(path)
}

/// Create (or truncate) `path` for writing with owner-only permissions.
///
/// # Errors
/// Returns an error if the file cannot be created.
pub fn create_truncate_secure(path: &Path) -> io::Result<File> {
    secure_options().write(true).create(true).truncate(true).open(path)
}

/// Run `write` against `file` (opened for append). On failure the file is
/// cut back to its previous length so no partial entry stays behind.
/// Returns the length before the write, which is where the new bytes start.
///
/// # Errors
/// Whatever `write` returns, or a metadata error.
pub fn append_or_rollback<F>(file: &mut File, write: F) -> Result<u64>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let start = file.metadata()?.len();
    if let Err(e) = write(file) {
        if let Err(trunc) = file.set_len(start) {
            warn!("could not roll back partial append at {start}: {trunc}");
        }
        return Err(e);
    }
    Ok(start)
}

/// Make sure `path` exists without touching existing content.
///
/// # Errors
/// Returns an error if the file cannot be created.
pub fn touch_secure(path: &Path) -> io::Result<()> {
    open_append_secure(path).map(drop)
}

/// Length of `path`, or 0 if it does not exist.
///
/// # Errors
/// Returns any metadata error other than `NotFound`.
pub fn len_or_zero(path: &Path) -> io::Result<u64> {
    match fs::metadata(path) {
        Ok(m) => Ok(m.len()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e),
    }
}

/// Remove `path`, treating a missing file as success.
///
/// # Errors
/// Returns any removal error other than `NotFound`.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Flush directory metadata so a completed rename survives power loss.
/// No-op where directories cannot be opened (Windows).
///
/// # Errors
/// Returns an error if the directory cannot be synced.
pub fn sync_dir(dir: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        File::open(dir)?.sync_all()?;
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
    }
    Ok(())
}

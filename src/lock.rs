//! Cross-process write lock for a store directory.
//!
//! Every mutation of the log or index (a register append pair, a compaction,
//! tail repair on open) runs under an exclusive `flock`/`LockFileEx` lock on
//! `users.lock`. The lock belongs to the open file description, so two
//! `StoreLock`s on the same path exclude each other even inside one process.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

#[derive(Debug)]
pub struct StoreLock {
    file: File,
}

/// Holds the exclusive lock until dropped.
#[derive(Debug)]
pub struct StoreLockGuard<'a> {
    file: &'a File,
}

impl StoreLock {
    /// Open or create the lock file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file or its directory cannot be created.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().read(true).write(true).create(true).truncate(false).open(path)?;
        Ok(Self { file })
    }

    /// Block until the exclusive lock is acquired.
    ///
    /// # Errors
    /// Returns the OS error if locking fails.
    pub fn lock(&self) -> io::Result<StoreLockGuard<'_>> {
        lock_exclusive(&self.file)?;
        Ok(StoreLockGuard { file: &self.file })
    }
}

impl Drop for StoreLockGuard<'_> {
    fn drop(&mut self) {
        let _ = unlock(self.file);
    }
}

#[cfg(unix)]
mod sys {
    use std::fs::File;
    use std::io;
    use std::os::raw::c_int;
    use std::os::unix::io::AsRawFd;

    const LOCK_EX: c_int = 2;
    const LOCK_UN: c_int = 8;

    unsafe extern "C" {
        fn flock(fd: c_int, operation: c_int) -> c_int;
    }

    fn call(file: &File, op: c_int) -> io::Result<()> {
        loop {
            let result = unsafe { flock(file.as_raw_fd(), op) };
            if result == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    pub(super) fn lock_exclusive(file: &File) -> io::Result<()> {
        call(file, LOCK_EX)
    }

    pub(super) fn unlock(file: &File) -> io::Result<()> {
        call(file, LOCK_UN)
    }
}

#[cfg(windows)]
mod sys {
    use std::fs::File;
    use std::io;
    use std::os::windows::io::AsRawHandle;

    type HANDLE = *mut std::ffi::c_void;

    #[repr(C)]
    #[allow(dead_code)]
    struct OVERLAPPED {
        internal: usize,
        internal_high: usize,
        offset: u32,
        offset_high: u32,
        h_event: HANDLE,
    }

    const LOCKFILE_EXCLUSIVE_LOCK: u32 = 0x2;

    unsafe extern "system" {
        fn LockFileEx(
            h_file: HANDLE,
            flags: u32,
            reserved: u32,
            bytes_to_lock_low: u32,
            bytes_to_lock_high: u32,
            overlapped: *mut OVERLAPPED,
        ) -> i32;
        fn UnlockFileEx(
            h_file: HANDLE,
            reserved: u32,
            bytes_to_unlock_low: u32,
            bytes_to_unlock_high: u32,
            overlapped: *mut OVERLAPPED,
        ) -> i32;
    }

    fn overlapped() -> OVERLAPPED {
        OVERLAPPED {
            internal: 0,
            internal_high: 0,
            offset: 0,
            offset_high: 0,
            h_event: std::ptr::null_mut(),
        }
    }

    pub(super) fn lock_exclusive(file: &File) -> io::Result<()> {
        let mut ov = overlapped();
        let handle = file.as_raw_handle() as HANDLE;
        let result = unsafe { LockFileEx(handle, LOCKFILE_EXCLUSIVE_LOCK, 0, 1, 0, &mut ov) };
        if result != 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
    }

    pub(super) fn unlock(file: &File) -> io::Result<()> {
        let mut ov = overlapped();
        let handle = file.as_raw_handle() as HANDLE;
        let result = unsafe { UnlockFileEx(handle, 0, 1, 0, &mut ov) };
        if result != 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
    }
}

// Single-process targets without file locks
#[cfg(not(any(unix, windows)))]
mod sys {
    use std::fs::File;
    use std::io;

    pub(super) fn lock_exclusive(_file: &File) -> io::Result<()> {
        Ok(())
    }

    pub(super) fn unlock(_file: &File) -> io::Result<()> {
        Ok(())
    }
}

use sys::{lock_exclusive, unlock};

//! Advisory file locking around the shared repository file
//!
//! The lock lives in a sibling file: `repositories.yaml` is guarded by
//! `repositories.lock`. Every read-modify-write of the guarded file runs
//! inside [`with_lock`], so concurrent processes serialize their updates.

use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chartform_core::Settings;
use chartform_core::settings::{DEFAULT_LOCK_POLL_INTERVAL, DEFAULT_LOCK_TIMEOUT};
use tokio::time::Instant;

use crate::error::{RepoError, Result};

/// How long to wait for the lock and how often to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_LOCK_TIMEOUT,
            poll_interval: DEFAULT_LOCK_POLL_INTERVAL,
        }
    }
}

impl From<&Settings> for LockOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            timeout: settings.lock_timeout,
            poll_interval: settings.lock_poll_interval,
        }
    }
}

/// Lock file path for a guarded file: the extension is replaced by `.lock`
pub fn lock_path_for(path: &Path) -> PathBuf {
    path.with_extension("lock")
}

/// An exclusive lock on a guarded file
///
/// Released by [`FileLock::release`] or, failing that, on drop.
#[derive(Debug)]
pub struct FileLock {
    file: Option<File>,
    path: PathBuf,
}

impl FileLock {
    /// Acquire the lock for `target`, polling until `options.timeout`
    pub async fn acquire(target: &Path, options: &LockOptions) -> Result<Self> {
        let path = lock_path_for(target);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| RepoError::filesystem(parent, e))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| RepoError::filesystem(&path, e))?;

        let deadline = Instant::now() + options.timeout;
        loop {
            match try_lock(&file) {
                Ok(()) => {
                    tracing::debug!(lock = %path.display(), "acquired file lock");
                    return Ok(Self {
                        file: Some(file),
                        path,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(RepoError::LockTimeout {
                            path,
                            timeout: options.timeout,
                        });
                    }
                    let wait = options.poll_interval.min(deadline - now);
                    tracing::debug!(
                        lock = %path.display(),
                        ?wait,
                        "lock is held elsewhere, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err(RepoError::filesystem(&path, e)),
            }
        }
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock, reporting any unlock failure
    pub fn release(mut self) -> Result<()> {
        match self.file.take() {
            Some(file) => unlock(&file).map_err(|e| RepoError::filesystem(&self.path, e)),
            None => Ok(()),
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = unlock(&file) {
                tracing::warn!(
                    lock = %self.path.display(),
                    error = %e,
                    "failed to release file lock"
                );
            }
        }
    }
}

/// Run `f` while holding the lock for `path`
///
/// The lock is released on every exit path. When `f` fails, its error is
/// returned even if releasing also failed; a release failure after success
/// becomes the result.
pub async fn with_lock<T, F, Fut>(path: &Path, options: &LockOptions, f: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let guard = FileLock::acquire(path, options).await?;
    let result = f().await;
    let lock_path = guard.path().to_path_buf();
    let released = guard.release();

    match (result, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(release_err)) => {
            tracing::warn!(
                lock = %lock_path.display(),
                error = %release_err,
                "failed to release file lock"
            );
            Err(release_err)
        }
        (Err(err), Err(release_err)) => {
            tracing::warn!(
                lock = %lock_path.display(),
                error = %release_err,
                "failed to release file lock"
            );
            Err(err)
        }
        (Err(err), Ok(())) => Err(err),
    }
}

#[cfg(unix)]
fn try_lock(file: &File) -> io::Result<()> {
    use rustix::fs::{FlockOperation, flock};
    use std::os::unix::io::AsFd;

    flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive)
        .map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(unix)]
fn unlock(file: &File) -> io::Result<()> {
    use rustix::fs::{FlockOperation, flock};
    use std::os::unix::io::AsFd;

    flock(file.as_fd(), FlockOperation::Unlock)
        .map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(windows)]
fn try_lock(file: &File) -> io::Result<()> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::{ERROR_LOCK_VIOLATION, HANDLE};
    use windows_sys::Win32::Storage::FileSystem::{
        LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx,
    };

    let handle = file.as_raw_handle() as HANDLE;

    // SAFETY: OVERLAPPED is plain data and valid when zeroed; the handle is
    // owned by `file` for the duration of the call.
    let result = unsafe {
        let mut overlapped = std::mem::zeroed();
        LockFileEx(
            handle,
            LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
            0,
            1,
            0,
            &mut overlapped,
        )
    };

    if result == 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32) {
            return Err(io::Error::from(io::ErrorKind::WouldBlock));
        }
        Err(err)
    } else {
        Ok(())
    }
}

#[cfg(windows)]
fn unlock(file: &File) -> io::Result<()> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::HANDLE;
    use windows_sys::Win32::Storage::FileSystem::UnlockFileEx;

    let handle = file.as_raw_handle() as HANDLE;

    // SAFETY: see `try_lock`.
    let result = unsafe {
        let mut overlapped = std::mem::zeroed();
        UnlockFileEx(handle, 0, 1, 0, &mut overlapped)
    };

    if result == 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

//! Advisory lock guarding read-modify-write cycles on a pool file
//!
//! The lock is a kernel `flock` on a sibling `.lock` file. The kernel drops
//! it when the holder exits, so a crashed process never leaves the pool
//! locked. The file body names the current holder for diagnostics only.

use chrono::{DateTime, Utc};
use nix::errno::Errno;
use nix::fcntl::{FlockArg, flock};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use super::error::{Result, StoreError};

/// Timing knobs for lock acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOptions {
    /// Give up after waiting this long
    pub timeout: Duration,
    /// Pause between attempts
    pub retry_interval: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retry_interval: Duration::from_millis(25),
        }
    }
}

/// Contents of a lock file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockOwner {
    pub pid: u32,
    pub host: String,
    pub user: String,
    pub acquired_at: DateTime<Utc>,
}

impl LockOwner {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            host: current_host(),
            user: whoami::username(),
            acquired_at: Utc::now(),
        }
    }
}

/// Held lock; released when dropped
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    owner: LockOwner,
    file: File,
}

impl LockGuard {
    pub fn owner(&self) -> &LockOwner {
        &self.owner
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // Unlink while the flock is still held; the fd closes afterwards.
        // A path that now names another inode belongs to someone else.
        if !same_file(&self.file, &self.path) {
            tracing::warn!(lock = %self.path.display(), "lock file was replaced while held; leaving it in place");
            return;
        }

        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(lock = %self.path.display(), "lock released"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(lock = %self.path.display(), error = %e, "failed to remove lock file"),
        }
    }
}

/// Path of the lock file protecting `target`
pub fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "pool".into());
    name.push(".lock");
    target.with_file_name(name)
}

/// Block until the lock for `target` is held or `options.timeout` elapses
pub fn acquire(target: &Path, options: &LockOptions) -> Result<LockGuard> {
    let path = lock_path_for(target);
    let started = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;

        if let Some(file) = try_lock(&path)? {
            let owner = LockOwner::current();
            record_owner(&file, &owner);
            tracing::debug!(lock = %path.display(), attempts, "lock acquired");
            return Ok(LockGuard { path, owner, file });
        }

        let waited = started.elapsed();
        if waited >= options.timeout {
            let holder = read_owner(&path);
            tracing::warn!(
                lock = %path.display(),
                holder_pid = holder.as_ref().map(|o| o.pid),
                holder_host = holder.as_ref().map(|o| o.host.as_str()),
                "gave up waiting for lock"
            );
            return Err(StoreError::LockTimeout {
                path: target.to_path_buf(),
                waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
            });
        }

        let remaining = options.timeout - waited;
        thread::sleep(options.retry_interval.min(remaining));
    }
}

/// One non-blocking attempt. `Ok(None)` means someone else holds the lock.
fn try_lock(path: &Path) -> Result<Option<File>> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;

    loop {
        match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
            Ok(()) => break,
            Err(Errno::EINTR) => continue,
            Err(Errno::EWOULDBLOCK) => return Ok(None),
            Err(errno) => return Err(StoreError::Io(errno.into())),
        }
    }

    // The previous holder may have unlinked this inode before we got it
    if same_file(&file, path) {
        Ok(Some(file))
    } else {
        Ok(None)
    }
}

fn same_file(file: &File, path: &Path) -> bool {
    match (file.metadata(), fs::metadata(path)) {
        (Ok(ours), Ok(on_disk)) => ours.dev() == on_disk.dev() && ours.ino() == on_disk.ino(),
        _ => false,
    }
}

fn record_owner(mut file: &File, owner: &LockOwner) {
    let written = serde_json::to_vec(owner)
        .map_err(std::io::Error::other)
        .and_then(|body| {
            file.set_len(0)?;
            file.write_all(&body)
        });
    if let Err(e) = written {
        tracing::debug!(error = %e, "could not record lock owner");
    }
}

/// Holder named in the lock file, if it is readable
fn read_owner(path: &Path) -> Option<LockOwner> {
    let content = fs::read(path).ok()?;
    serde_json::from_slice(&content).ok()
}

fn current_host() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

//! Cross-process mutual exclusion over the registry file.
//!
//! Built on exclusive atomic file creation (`O_CREAT | O_EXCL`) rather
//! than OS advisory locks, so the semantics are identical across every
//! platform and survive processes that share no ancestry. A holder that
//! crashes leaves its lock file behind; the next acquirer detects the
//! stale file by age and force-clears it.
//!
//! Lock scope is local file I/O only. Holders must never carry the guard
//! across a network or subprocess boundary, which bounds worst-case hold
//! time well under the staleness threshold.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{RegistryError, RegistryResult};

/// A lock file older than this is considered abandoned by a crashed
/// holder and is force-cleared by the next acquirer.
pub const LOCK_STALE_AFTER: Duration = Duration::from_secs(10);

/// Total sleep budget across all acquisition retries.
pub const LOCK_BUDGET: Duration = Duration::from_secs(2);

/// Per-attempt backoff schedule; sums to [`LOCK_BUDGET`]. The final
/// attempt is made after the last sleep.
const BACKOFF: [Duration; 6] = [
    Duration::from_millis(25),
    Duration::from_millis(50),
    Duration::from_millis(100),
    Duration::from_millis(225),
    Duration::from_millis(500),
    Duration::from_millis(1100),
];

/// The registry mutex: a path plus acquisition policy.
#[derive(Debug, Clone)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    /// Create a handle for the lock at `path`. Does not touch the
    /// filesystem.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire the lock, retrying with exponential backoff within
    /// [`LOCK_BUDGET`].
    ///
    /// Stale lock files (older than [`LOCK_STALE_AFTER`]) are removed
    /// before the next attempt, so a crashed holder delays contenders by
    /// at most one backoff step.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::LockContended`] when the budget is
    /// exhausted; mutating callers must treat that as a denial, never as
    /// permission to proceed unlocked.
    pub fn acquire(&self) -> RegistryResult<LockGuard> {
        let attempts = BACKOFF.len() as u32 + 1;
        for (i, backoff) in std::iter::once(None)
            .chain(BACKOFF.iter().map(Some))
            .enumerate()
        {
            if let Some(delay) = backoff {
                std::thread::sleep(*delay);
            }
            match self.try_acquire()? {
                Some(guard) => {
                    debug!(path = %self.path.display(), attempt = i + 1, "acquired registry lock");
                    return Ok(guard);
                },
                None => self.clear_if_stale(),
            }
        }
        Err(RegistryError::LockContended {
            path: self.path.display().to_string(),
            attempts,
        })
    }

    /// One exclusive-create attempt. `Ok(None)` means another holder has
    /// the lock.
    fn try_acquire(&self) -> RegistryResult<Option<LockGuard>> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RegistryError::Io(e.to_string()))?;
        }
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(mut file) => {
                use std::io::Write;
                // Holder identity is diagnostic only; exclusivity comes
                // from create_new.
                let _ = writeln!(file, "{}", std::process::id());
                let _ = file.sync_all();
                Ok(Some(LockGuard {
                    path: self.path.clone(),
                }))
            },
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(RegistryError::Io(e.to_string())),
        }
    }

    /// Remove the lock file if its age exceeds [`LOCK_STALE_AFTER`].
    fn clear_if_stale(&self) {
        let Ok(meta) = std::fs::metadata(&self.path) else {
            return; // released between the attempt and now
        };
        let Ok(modified) = meta.modified() else {
            return;
        };
        let Ok(age) = modified.elapsed() else {
            return; // clock skew; treat as fresh
        };
        if age > LOCK_STALE_AFTER {
            warn!(
                path = %self.path.display(),
                age_secs = age.as_secs(),
                "clearing stale registry lock (holder presumed crashed)"
            );
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Held lock; releases on drop.
///
/// Mutating registry operations require a `&LockGuard` so the
/// read-modify-write span provably happens under the lock.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    /// Release the lock explicitly (equivalent to dropping).
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove lock file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock = LockFile::new(dir.path().join("registry.lock"));

        let guard = lock.acquire().unwrap();
        assert!(lock.path().exists());
        guard.release();
        assert!(!lock.path().exists());
    }

    #[test]
    fn test_reacquire_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock = LockFile::new(dir.path().join("registry.lock"));
        drop(lock.acquire().unwrap());
        drop(lock.acquire().unwrap());
    }

    #[test]
    fn test_contention_fails_within_budget() {
        let dir = tempfile::tempdir().unwrap();
        let lock = LockFile::new(dir.path().join("registry.lock"));

        let _held = lock.acquire().unwrap();
        let start = Instant::now();
        let err = lock.acquire().unwrap_err();
        assert!(matches!(err, RegistryError::LockContended { .. }));
        // Bounded: all backoff steps plus slack, well under staleness.
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_stale_lock_is_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.lock");
        std::fs::write(&path, "12345\n").unwrap();

        // Backdate the lock file past the staleness threshold.
        let stale = filetime_backdate(&path, LOCK_STALE_AFTER + Duration::from_secs(5));
        if !stale {
            // Platform without mtime manipulation support; nothing to test.
            return;
        }

        let lock = LockFile::new(&path);
        let guard = lock.acquire().unwrap();
        drop(guard);
    }

    /// Best-effort mtime backdating via direct utimes-style rewrite:
    /// recreate the file then set its modified time into the past.
    fn filetime_backdate(path: &Path, by: Duration) -> bool {
        let Some(target) = std::time::SystemTime::now().checked_sub(by) else {
            return false;
        };
        let file = match std::fs::OpenOptions::new().write(true).open(path) {
            Ok(f) => f,
            Err(_) => return false,
        };
        file.set_modified(target).is_ok()
    }

    #[test]
    fn test_mutual_exclusion_across_threads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.lock");

        let mut handles = Vec::new();
        let concurrently_held = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
        let max_seen = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));

        for _ in 0..4 {
            let path = path.clone();
            let held = concurrently_held.clone();
            let max = max_seen.clone();
            handles.push(std::thread::spawn(move || {
                use std::sync::atomic::Ordering;
                let lock = LockFile::new(path);
                let guard = lock.acquire().unwrap();
                let now = held.fetch_add(1, Ordering::SeqCst) + 1;
                max.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                held.fetch_sub(1, Ordering::SeqCst);
                drop(guard);
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(
            max_seen.load(std::sync::atomic::Ordering::SeqCst),
            1,
            "lock admitted more than one holder at a time"
        );
    }
}

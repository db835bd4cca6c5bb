//! Cross-process named locks.
//!
//! All clone/fetch operations against one mirror are totally ordered by
//! an advisory file lock keyed by the mirror's logical name. Lock files
//! live in a shared directory under the cache root, so every process
//! using the same cache root contends on the same lock.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::debug;

use crate::error::MirrorError;

/// How often a blocked acquisition re-checks the lock.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// An advisory, timeout-bounded, cross-process lock identified by name.
///
/// Holding the OS-level exclusive lock on the lock file is holding the
/// lock. The lock is released when this guard is dropped, on every exit
/// path.
#[derive(Debug)]
pub struct NamedLock {
    name: String,
    path: PathBuf,
    /// When this is Some, we hold the lock.
    file: Option<File>,
}

impl NamedLock {
    /// Acquires the lock `name` under `dir`, waiting up to `timeout`.
    ///
    /// Blocks the calling thread, polling the OS lock until it is granted
    /// or the deadline passes. Run inside `spawn_blocking` from async
    /// contexts.
    ///
    /// # Errors
    ///
    /// - [`MirrorError::LockTimeout`] if the deadline expires first
    /// - [`MirrorError::Io`] if the lock file cannot be created or locked
    pub fn acquire(dir: &Path, name: &str, timeout: Duration) -> Result<Self, MirrorError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{name}.lock"));

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!(lock = name, "acquired named lock");
                    return Ok(Self {
                        name: name.to_string(),
                        path,
                        file: Some(file),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(MirrorError::LockTimeout {
                            name: name.to_string(),
                            seconds: timeout.as_secs(),
                        });
                    }
                    let remaining = deadline.duration_since(now);
                    std::thread::sleep(POLL_INTERVAL.min(remaining));
                }
                Err(e) => return Err(MirrorError::Io(e)),
            }
        }
    }

    /// Returns the lock name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if this guard still holds the lock.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Releases the lock before the guard goes out of scope.
    pub fn release(&mut self) -> Result<(), MirrorError> {
        if let Some(file) = self.file.take() {
            FileExt::unlock(&file)?;
            debug!(lock = %self.name, "released named lock");
        }
        Ok(())
    }
}

impl Drop for NamedLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = FileExt::unlock(&file);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn acquire_and_release() {
        let dir = TempDir::new().unwrap();

        let mut lock = NamedLock::acquire(dir.path(), "repo", Duration::from_secs(1)).unwrap();
        assert!(lock.is_held());
        assert!(lock.path().exists());
        assert_eq!(lock.name(), "repo");

        lock.release().unwrap();
        assert!(!lock.is_held());
    }

    #[test]
    fn released_on_drop() {
        let dir = TempDir::new().unwrap();

        {
            let lock = NamedLock::acquire(dir.path(), "repo", Duration::from_secs(1)).unwrap();
            assert!(lock.is_held());
        }

        let lock = NamedLock::acquire(dir.path(), "repo", Duration::ZERO).unwrap();
        assert!(lock.is_held());
    }

    #[test]
    fn distinct_names_do_not_contend() {
        let dir = TempDir::new().unwrap();

        let _a = NamedLock::acquire(dir.path(), "alpha", Duration::ZERO).unwrap();
        let _b = NamedLock::acquire(dir.path(), "beta", Duration::ZERO).unwrap();
    }

    #[test]
    fn second_holder_times_out() {
        let dir = TempDir::new().unwrap();

        let _held = NamedLock::acquire(dir.path(), "repo", Duration::from_secs(1)).unwrap();
        let result = NamedLock::acquire(dir.path(), "repo", Duration::from_millis(200));

        match result {
            Err(MirrorError::LockTimeout { name, .. }) => {
                assert_eq!(name, "repo");
            }
            other => panic!("expected LockTimeout, got {other:?}"),
        }
    }

    #[test]
    fn multiple_release_calls_are_safe() {
        let dir = TempDir::new().unwrap();

        let mut lock = NamedLock::acquire(dir.path(), "repo", Duration::from_secs(1)).unwrap();
        lock.release().unwrap();
        lock.release().unwrap();
        assert!(!lock.is_held());
    }

    #[test]
    fn holders_never_overlap() {
        let dir = TempDir::new().unwrap();
        let lock_dir = dir.path().to_path_buf();

        let holders = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let lock_dir = lock_dir.clone();
                let holders = Arc::clone(&holders);
                let peak = Arc::clone(&peak);
                std::thread::spawn(move || {
                    let _lock =
                        NamedLock::acquire(&lock_dir, "repo", Duration::from_secs(10)).unwrap();
                    let now = holders.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    holders.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1, "lock holders overlapped");
    }
}

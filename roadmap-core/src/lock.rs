//! Single-writer guard for a project database
//!
//! Holds an exclusive advisory lock on `<database>.lock` for as long as the
//! facade is open, so a second CLI process on the same project waits or
//! fails instead of interleaving writes.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct ProjectLock {
    path: PathBuf,
    file: Option<File>,
}

impl ProjectLock {
    /// Lock file path for a database path
    pub fn lock_path(database: &Path) -> PathBuf {
        let mut name = database.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Acquires the lock for `database`, polling until `timeout` elapses
    pub fn acquire(database: &Path, timeout: Duration) -> Result<Self> {
        let path = Self::lock_path(database);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;

        let start = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() >= timeout {
                        return Err(Error::Lock(format!(
                            "timed out after {:?} waiting for {} - another process is using this project",
                            timeout,
                            path.display()
                        )));
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(Error::Lock(format!(
                        "failed to lock {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }

        // Holder info, for whoever finds the lock file
        file.set_len(0)?;
        let _ = writeln!(
            file,
            "Locked by PID {} at {}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );

        tracing::debug!(lock = %path.display(), "acquired project lock");
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Releases the lock. Calling it again is a no-op.
    pub fn release(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .map_err(|e| Error::Lock(format!("failed to unlock {}: {}", self.path.display(), e)))?;
            tracing::debug!(lock = %self.path.display(), "released project lock");
        }
        Ok(())
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(error = %e, "releasing project lock on drop failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path_appends_suffix() {
        assert_eq!(
            ProjectLock::lock_path(Path::new("/tmp/ACME.db")),
            PathBuf::from("/tmp/ACME.db.lock")
        );
    }

    #[test]
    fn test_second_acquire_times_out() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("PRJ.db");

        let held = ProjectLock::acquire(&db, Duration::from_secs(1)).unwrap();
        assert!(held.is_held());
        assert!(held.path().exists());

        let err = ProjectLock::acquire(&db, Duration::from_millis(200)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(matches!(err, Error::Lock(_)));
    }

    #[test]
    fn test_release_allows_reacquire() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("nested").join("PRJ.db");

        let mut first = ProjectLock::acquire(&db, Duration::from_secs(1)).unwrap();
        first.release().unwrap();
        first.release().unwrap();
        assert!(!first.is_held());

        let second = ProjectLock::acquire(&db, Duration::from_millis(200)).unwrap();
        drop(second);
        ProjectLock::acquire(&db, Duration::from_millis(200)).unwrap();
    }
}

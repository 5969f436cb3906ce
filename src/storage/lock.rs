//! Single-instance lock file
//!
//! Weak mutual exclusion for one machine: the daemon refuses to start when
//! another live process holds the lock. The holder pid is written into the
//! file; a lock whose pid no longer exists is reclaimed.

use anyhow::{bail, Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Held lock file, removed on drop
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    /// Acquire the lock, reclaiming it when the recorded holder is dead
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create lock directory: {}", parent.display())
            })?;
        }

        match Self::try_create(&path) {
            Ok(lock) => Ok(lock),
            Err(_) => {
                if Self::holder_is_dead(&path) {
                    warn!(path = %path.display(), "Reclaiming stale lock file");
                    fs::remove_file(&path).with_context(|| {
                        format!("Failed to remove stale lock: {}", path.display())
                    })?;
                    return Self::try_create(&path);
                }
                bail!(
                    "Another instance is already running (lock held: {})",
                    path.display()
                );
            }
        }
    }

    fn try_create(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .with_context(|| format!("Lock file exists: {}", path.display()))?;

        writeln!(file, "{}", std::process::id())
            .with_context(|| format!("Failed to write lock file: {}", path.display()))?;

        info!(path = %path.display(), "Acquired instance lock");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Check whether the pid recorded in an existing lock file is gone
    fn holder_is_dead(path: &Path) -> bool {
        let Ok(content) = fs::read_to_string(path) else {
            return false;
        };
        let Ok(pid) = content.trim().parse::<u32>() else {
            // Unreadable holder pid, treat the lock as abandoned
            return true;
        };

        if pid == std::process::id() {
            return false;
        }

        #[cfg(target_os = "linux")]
        {
            !Path::new(&format!("/proc/{pid}")).exists()
        }
        #[cfg(not(target_os = "linux"))]
        {
            false
        }
    }

    /// Path of the held lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove lock file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crier.lock");

        {
            let lock = LockFile::acquire(&path).unwrap();
            assert!(lock.path().exists());

            // Second acquisition by the same live process must fail
            assert!(LockFile::acquire(&path).is_err());
        }

        // Dropped lock is removed, so it can be re-acquired
        assert!(!path.exists());
        let _lock = LockFile::acquire(&path).unwrap();
    }

    #[test]
    fn test_stale_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crier.lock");

        // Garbage holder pid counts as abandoned
        fs::write(&path, "not-a-pid").unwrap();
        let lock = LockFile::acquire(&path);
        assert!(lock.is_ok());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_dead_pid_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crier.lock");

        // Pid far outside the usual range, almost certainly dead
        fs::write(&path, "4194000").unwrap();
        let lock = LockFile::acquire(&path);
        assert!(lock.is_ok());
    }
}

//! Atomic JSON state store
//!
//! State files are the only durability mechanism in crier: each subsystem
//! serializes its state to JSON after every mutation. Writes go to a
//! temporary file in the same directory followed by a rename, so a crash
//! mid-write leaves the previous state intact.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Store for named JSON state files under a single directory
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Create a store rooted at `dir`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Path of a named state file
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// State directory root
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load a state file, returning `None` when it does not exist
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.path(name);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;
        Ok(Some(value))
    }

    /// Load a state file, falling back to the default on a missing or
    /// corrupt file
    ///
    /// A corrupt state file is logged and treated as empty rather than
    /// aborting the process; the next save overwrites it.
    pub fn load_or_default<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        match self.load(name) {
            Ok(Some(value)) => value,
            Ok(None) => T::default(),
            Err(e) => {
                warn!(file = name, error = %e, "State file unreadable, starting from empty state");
                T::default()
            }
        }
    }

    /// Save a state file atomically (temp file + rename)
    pub fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.path(name);
        let tmp = self.dir.join(format!(".{name}.tmp"));

        let json = serde_json::to_string_pretty(value).context("Failed to serialize state")?;
        fs::write(&tmp, json)
            .with_context(|| format!("Failed to write state file: {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace state file: {}", path.display()))?;

        Ok(())
    }

    /// Remove a state file if present
    pub fn remove(&self, name: &str) -> Result<()> {
        let path = self.path(name);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove state file: {}", path.display()))?;
        }
        Ok(())
    }
}

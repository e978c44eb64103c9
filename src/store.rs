//! The version-addressed tool store.
//!
//! Every installed `(name, version)` pair owns exactly one entry directly under
//! the store root, named `{name}_{version}`:
//!
//! ```text
//! .bin/.store/
//!   git-cliff_2.2.1/          # archive install: unpacked directory
//!     git-cliff
//!   staticcheck_2024.1.1      # toolchain install: the binary itself
//! ```
//!
//! Entries are never rewritten in place. Installs are built in a hidden
//! staging path next to their final location and renamed into place only once
//! complete, so an interrupted install never looks like a finished one.

use crate::error::Result;
use anyhow::Context;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Check whether `path` exists.
///
/// Not-found is `Ok(false)`; any other failure (permissions, I/O) propagates.
pub fn exists(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(anyhow::Error::new(e)
            .context(format!("Failed to check whether {} exists", path.display()))
            .into()),
    }
}

#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final location of the entry named `entry`
    pub fn entry_path(&self, entry: &str) -> PathBuf {
        self.root.join(entry)
    }

    pub fn contains(&self, entry: &str) -> Result<bool> {
        exists(&self.entry_path(entry))
    }

    /// Start an install of `entry`, returning a fresh staging path.
    ///
    /// The staging path itself is not created; leftovers from an earlier
    /// interrupted install are removed.
    pub fn begin(&self, entry: &str) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create store directory: {}", self.root.display()))?;

        let staging = self.root.join(format!(".{entry}.partial"));
        remove_any(&staging)
            .with_context(|| format!("Failed to clear stale staging path: {}", staging.display()))?;

        debug!(path = %staging.display(), "Staging store entry");
        Ok(staging)
    }

    /// Move a finished staging path into its final place
    pub fn commit(&self, staging: &Path, entry: &str) -> anyhow::Result<PathBuf> {
        let dest = self.entry_path(entry);
        fs::rename(staging, &dest).with_context(|| {
            format!(
                "Failed to move {} into the store at {}",
                staging.display(),
                dest.display()
            )
        })?;
        Ok(dest)
    }

    /// Throw away a failed install
    pub fn abort(&self, staging: &Path) {
        if let Err(e) = remove_any(staging) {
            debug!(path = %staging.display(), error = %e, "Failed to remove staging path");
        }
    }
}

fn remove_any(path: &Path) -> io::Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

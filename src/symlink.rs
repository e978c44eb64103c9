//! Publishing tools into the bin directory.
//!
//! Each tool name owns exactly one symlink, `{bin_dir}/{name}`, pointing at the
//! binary of the currently pinned version inside the store. When the store
//! lives under the bin directory (the default layout) the link is relative so
//! the whole bin directory can be moved or cached as a unit:
//!
//! ```text
//! .bin/git-cliff -> .store/git-cliff_2.2.1/git-cliff
//! ```
//!
//! Republishing is remove-then-create. That pair is not atomic, so two
//! publishers for the same tool name must not run at the same time.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::os::unix::fs as unix_fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Check whether `{bin_dir}/{name}` already resolves to
/// `{store_dir}/{versioned_bin}`.
///
/// A missing or dangling link is reported as `false`, not as an error.
pub fn is_current(
    name: &str,
    versioned_bin: &Path,
    bin_dir: &Path,
    store_dir: &Path,
) -> Result<bool> {
    let link = bin_dir.join(name);

    let resolved = match fs::canonicalize(&link) {
        Ok(path) => path,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(e).with_context(|| {
                format!("Failed to check if tool {} has already been linked", name)
            });
        }
    };

    let expected = match fs::canonicalize(store_dir.join(versioned_bin)) {
        Ok(path) => path,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(e).with_context(|| {
                format!("Failed to resolve store entry for tool {}", name)
            });
        }
    };

    Ok(resolved == expected)
}

/// Point `{bin_dir}/{name}` at `{store_dir}/{versioned_bin}`, replacing
/// whatever was there before. Returns the link path.
pub fn publish(
    name: &str,
    versioned_bin: &Path,
    bin_dir: &Path,
    store_dir: &Path,
) -> Result<PathBuf> {
    let link = bin_dir.join(name);
    let target = link_target(&store_dir.join(versioned_bin), bin_dir)?;

    match fs::remove_file(&link) {
        Ok(()) => debug!(link = %link.display(), "Removed previous link"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| {
                format!(
                    "Failed to symlink {} to {}: can't remove existing file at target",
                    target.display(),
                    link.display()
                )
            });
        }
    }

    fs::create_dir_all(bin_dir)
        .with_context(|| format!("Failed to create directory: {}", bin_dir.display()))?;

    unix_fs::symlink(&target, &link).with_context(|| {
        format!(
            "Failed to create symlink: {} -> {}",
            link.display(),
            target.display()
        )
    })?;

    debug!(link = %link.display(), target = %target.display(), "Published symlink");
    Ok(link)
}

/// Relative path from `bin_dir` when the binary lives below it, absolute
/// otherwise
fn link_target(binary: &Path, bin_dir: &Path) -> Result<PathBuf> {
    let binary = std::path::absolute(binary)
        .with_context(|| format!("Failed to resolve path: {}", binary.display()))?;
    let bin_dir = std::path::absolute(bin_dir)
        .with_context(|| format!("Failed to resolve path: {}", bin_dir.display()))?;

    Ok(match binary.strip_prefix(&bin_dir) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => binary,
    })
}

//! A recipe bound to a pinned version.

use crate::error::{Error, Result};
use crate::recipe::{Recipe, SourceKind};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One requested tool: the recipe that describes it and the version pinned
/// for it. Every store and link path is derived from these two values.
#[derive(Debug, Clone)]
pub struct Tool<'a> {
    recipe: &'a Recipe,
    version: String,
}

impl<'a> Tool<'a> {
    pub fn new(recipe: &'a Recipe, version: impl Into<String>) -> Self {
        Self {
            recipe,
            version: version.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.recipe.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn recipe(&self) -> &'a Recipe {
        self.recipe
    }

    /// `name@version`, used in messages
    pub fn versioned_name(&self) -> String {
        format!("{}@{}", self.name(), self.version)
    }

    /// Name of this tool's entry directly under the store root
    pub fn store_dir(&self) -> String {
        format!("{}_{}", self.name(), self.version)
    }

    /// Executable location relative to the store root
    pub fn bin_path(&self) -> PathBuf {
        let entry = PathBuf::from(self.store_dir());
        match (&self.recipe.source.bin_path, self.recipe.source.kind) {
            (Some(sub), _) => entry.join(sub),
            (None, SourceKind::Archive) => entry.join(self.name()),
            (None, SourceKind::Toolchain) => entry,
        }
    }

    /// Version as a git tag: `1.2.3` becomes `v1.2.3`, `v1.2.3` is kept
    pub fn tag(&self) -> String {
        if self.version.starts_with('v') {
            self.version.clone()
        } else {
            format!("v{}", self.version)
        }
    }

    /// Run the published binary with the recipe's test arguments.
    ///
    /// Recipes without test arguments pass trivially. Output goes straight to
    /// the caller's terminal.
    pub async fn run_smoke_test(&self, bin_dir: &Path, cancel: &CancellationToken) -> Result<()> {
        if self.recipe.test.is_empty() {
            return Ok(());
        }

        let program = bin_dir.join(self.name());
        let command = format!("{} {}", program.display(), self.recipe.test.join(" "));
        debug!(tool = %self.name(), %command, "Running smoke test");

        let mut cmd = Command::new(&program);
        cmd.args(&self.recipe.test).kill_on_drop(true);

        let status = tokio::select! {
            status = cmd.status() => status,
            () = cancel.cancelled() => return Err(Error::Cancelled),
        };

        let failure = match status {
            Ok(status) if status.success() => return Ok(()),
            Ok(status) => status.to_string(),
            Err(e) => format!("failed to start ({e})"),
        };

        Err(Error::Verification {
            tool: self.versioned_name(),
            command,
            status: failure,
        })
    }
}

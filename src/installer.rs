//! Strategies that put a tool into the store.
//!
//! There are exactly two ways a tool arrives, one per [`SourceKind`]:
//!
//! - **Toolchain**: `go install <module>@v<version>` with `GOBIN` pointed at a
//!   staging directory. The single binary it produces becomes the store entry.
//! - **Archive**: the recipe's URL template is rendered for the host platform,
//!   downloaded and unpacked. The unpacked directory becomes the store entry.
//!
//! Both stage their output next to the final entry and rename it into place
//! on success, so a failed or cancelled install leaves no store entry behind.

use crate::download::Downloader;
use crate::error::{Error, Result};
use crate::platform::Platform;
use crate::recipe::{Recipe, SourceKind};
use crate::store::Store;
use crate::template;
use crate::tool::Tool;
use anyhow::{Context, bail};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Everything an install needs besides the tool itself
pub struct InstallContext<'a> {
    pub downloader: &'a Downloader,
    pub platform: &'a Platform,
    pub store: &'a Store,
    /// Program used for toolchain installs, usually `go`
    pub toolchain: &'a str,
    pub cancel: &'a CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Installer {
    Toolchain,
    Archive,
}

impl Installer {
    pub fn for_recipe(recipe: &Recipe) -> Self {
        match recipe.source.kind {
            SourceKind::Toolchain => Installer::Toolchain,
            SourceKind::Archive => Installer::Archive,
        }
    }

    /// Install `tool` into the store and return its entry path.
    ///
    /// Every failure other than cancellation comes back as
    /// [`Error::Installation`].
    pub async fn install(self, ctx: &InstallContext<'_>, tool: &Tool<'_>) -> Result<PathBuf> {
        info!(tool = %tool.name(), version = %tool.version(), installer = ?self, "Installing");

        let entry = tool.store_dir();
        let staging = ctx
            .store
            .begin(&entry)
            .map_err(|e| Error::installation(tool.versioned_name(), e))?;

        let result = match self {
            Installer::Toolchain => install_toolchain(ctx, tool, &staging).await,
            Installer::Archive => install_archive(ctx, tool, &staging).await,
        };

        match result.and_then(|built| ctx.store.commit(&built, &entry)) {
            Ok(path) => {
                ctx.store.abort(&staging);
                debug!(path = %path.display(), "Store entry committed");
                Ok(path)
            }
            Err(e) => {
                ctx.store.abort(&staging);
                Err(Error::installation(tool.versioned_name(), e))
            }
        }
    }
}

/// Returns the path of the built binary inside `staging`
async fn install_toolchain(
    ctx: &InstallContext<'_>,
    tool: &Tool<'_>,
    staging: &Path,
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(staging)
        .with_context(|| format!("Failed to create directory: {}", staging.display()))?;
    let gobin = std::path::absolute(staging)
        .with_context(|| format!("Failed to resolve path: {}", staging.display()))?;

    let module_path = &tool.recipe().source.url_template;
    let module = format!("{}@{}", module_path, tool.tag());
    debug!(toolchain = %ctx.toolchain, %module, gobin = %gobin.display(), "Running toolchain install");

    let mut cmd = Command::new(ctx.toolchain);
    cmd.arg("install")
        .arg(&module)
        .env("GOBIN", &gobin)
        .kill_on_drop(true);

    let status = tokio::select! {
        status = cmd.status() => status
            .with_context(|| format!("Failed to run '{} install {}'", ctx.toolchain, module))?,
        () = ctx.cancel.cancelled() => return Err(Error::Cancelled.into()),
    };

    if !status.success() {
        bail!("'{} install {}' failed: {}", ctx.toolchain, module, status);
    }

    let built = gobin.join(binary_name(module_path));
    if !built.is_file() {
        bail!(
            "'{} install {}' did not produce {}",
            ctx.toolchain,
            module,
            built.display()
        );
    }
    Ok(built)
}

/// Returns `staging` once the archive is unpacked into it
async fn install_archive(
    ctx: &InstallContext<'_>,
    tool: &Tool<'_>,
    staging: &Path,
) -> anyhow::Result<PathBuf> {
    let url = archive_url(tool.recipe(), tool.version(), ctx.platform)?;
    ctx.downloader
        .download_and_unpack(&url, staging, ctx.cancel)
        .await?;
    Ok(staging.to_path_buf())
}

/// Render the recipe's download URL for `platform`
pub fn archive_url(recipe: &Recipe, version: &str, platform: &Platform) -> anyhow::Result<String> {
    let os = recipe.map_os(&platform.os);
    let arch = recipe.map_arch(&platform.arch);
    template::render(
        &recipe.source.url_template,
        &[("Version", version), ("OS", os), ("Arch", arch)],
    )
    .with_context(|| format!("Failed to render download URL for {}", recipe.name))
}

/// Binary produced by installing `module`: its last path segment, skipping a
/// trailing major-version segment such as `/v2`
fn binary_name(module: &str) -> &str {
    let mut segments = module.trim_end_matches('/').rsplit('/');
    let last = segments.next().unwrap_or(module);

    let is_major = last.len() > 1
        && last.starts_with('v')
        && last[1..].chars().all(|c| c.is_ascii_digit());
    match (is_major, segments.next()) {
        (true, Some(parent)) => parent,
        _ => last,
    }
}

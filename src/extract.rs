//! Archive extraction into the store.
//!
//! The format is chosen from the trailing extension of the download URL, never
//! by sniffing content:
//!
//! | extension | handling                                                  |
//! |-----------|-----------------------------------------------------------|
//! | `.zip`    | entries recreated with their relative paths and modes     |
//! | `.tar`    | regular files written flat into the destination           |
//! | `.gz`     | gzip-decoded, then handled like `.tar`                    |
//! | `.xz`     | external `tar`, top-level directory stripped              |
//!
//! Tarballs usually wrap everything in a versioned top-level folder
//! (`tool-1.2.3/tool`). Writing entries by file name drops that folder so the
//! binary lands directly in the destination. Directory entries are not
//! recreated: flattened, a folder named like the binary it wraps (`jq/jq`)
//! would take the binary's place.
//!
//! Any failing entry aborts the whole unpack. Files already written are not
//! rolled back here; callers extract into a staging directory.
//!
//! # Examples
//!
//! ```no_run
//! use toolpin::extract::{self, ArchiveFormat};
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let url = "https://example.com/tool-1.0.0-linux.tar.gz";
//!     let format = ArchiveFormat::from_url(url)?;
//!     extract::unpack(
//!         Path::new("/tmp/tool.tar.gz"),
//!         format,
//!         Path::new(".bin/.store/tool_1.0.0"),
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//!     Ok(())
//! }
//! ```

use crate::error::{Error, Result};
use anyhow::{Context, bail};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Stdio;
use tar::Archive;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
    TarXz,
}

impl ArchiveFormat {
    /// Pick the format from the last extension of a URL's path
    pub fn from_url(url: &str) -> Result<Self> {
        let ext = url_extension(url);
        match ext.as_deref() {
            Some("zip") => Ok(ArchiveFormat::Zip),
            Some("tar") => Ok(ArchiveFormat::Tar),
            Some("gz") => Ok(ArchiveFormat::TarGz),
            Some("xz") => Ok(ArchiveFormat::TarXz),
            other => Err(Error::UnknownFormat(format!(".{}", other.unwrap_or("")))),
        }
    }

    /// File extension including the leading dot
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => ".zip",
            ArchiveFormat::Tar => ".tar",
            ArchiveFormat::TarGz => ".gz",
            ArchiveFormat::TarXz => ".xz",
        }
    }
}

/// Extension of the last path segment, ignoring query and fragment
fn url_extension(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    let (_, ext) = segment.rsplit_once('.')?;
    Some(ext.to_string())
}

/// Unpack `archive` into `dest`, creating `dest` as needed.
///
/// Only the `.xz` path runs an external process; it is killed if `cancel`
/// fires.
pub async fn unpack(
    archive: &Path,
    format: ArchiveFormat,
    dest: &Path,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    debug!(archive = %archive.display(), dest = %dest.display(), ?format, "Unpacking archive");

    match format {
        ArchiveFormat::Zip => unpack_zip(archive, dest),
        ArchiveFormat::Tar => {
            let file = open(archive)?;
            unpack_tar(BufReader::new(file), dest)
        }
        ArchiveFormat::TarGz => {
            let file = open(archive)?;
            unpack_tar(GzDecoder::new(BufReader::new(file)), dest)
        }
        ArchiveFormat::TarXz => unpack_tar_xz(archive, dest, cancel).await,
    }
}

fn open(archive: &Path) -> anyhow::Result<File> {
    File::open(archive).with_context(|| format!("Failed to open archive: {}", archive.display()))
}

fn unpack_zip(archive: &Path, dest: &Path) -> anyhow::Result<()> {
    let file = open(archive)?;
    let mut zip = zip::ZipArchive::new(BufReader::new(file))
        .with_context(|| format!("Failed to read ZIP archive: {}", archive.display()))?;

    fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create directory: {}", dest.display()))?;

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .with_context(|| format!("Failed to read ZIP entry #{}", i))?;

        let Some(relative) = entry.enclosed_name() else {
            bail!("ZIP entry escapes destination: {}", entry.name());
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .with_context(|| format!("Failed to create directory: {}", out_path.display()))?;
            continue;
        }

        let mode = entry.unix_mode();
        write_entry(&mut entry, &out_path, mode)
            .with_context(|| format!("Failed to decompress {} to {}", entry.name(), out_path.display()))?;
    }

    Ok(())
}

fn unpack_tar<R: Read>(reader: R, dest: &Path) -> anyhow::Result<()> {
    let mut archive = Archive::new(reader);

    fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create directory: {}", dest.display()))?;

    for entry in archive.entries().context("Failed to read tar archive")? {
        let mut entry = entry.context("Failed to read tar entry")?;
        let path = entry.path().context("Invalid path in tar entry")?.into_owned();
        let entry_type = entry.header().entry_type();

        if !entry_type.is_file() {
            debug!(path = %path.display(), ?entry_type, "Skipping non-file tar entry");
            continue;
        }

        let Some(file_name) = path.file_name() else {
            debug!(path = %path.display(), "Skipping tar entry without file name");
            continue;
        };

        let out_path = dest.join(file_name);
        let mode = entry.header().mode().ok();
        write_entry(&mut entry, &out_path, mode)
            .with_context(|| format!("Failed to unpack {} to {}", path.display(), out_path.display()))?;
    }

    Ok(())
}

/// Copy one entry into a newly created file, keeping its permission bits
fn write_entry(reader: &mut impl Read, out_path: &Path, mode: Option<u32>) -> anyhow::Result<()> {
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let mut file = File::create(out_path)?;
    io::copy(reader, &mut file)?;

    if let Some(mode) = mode {
        fs::set_permissions(out_path, fs::Permissions::from_mode(mode & 0o7777))?;
    }

    Ok(())
}

/// No native xz decoder: let the system `tar` unpack into a private directory
/// next to `dest`, then rename it into place.
async fn unpack_tar_xz(archive: &Path, dest: &Path, cancel: &CancellationToken) -> anyhow::Result<()> {
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

    let prefix = format!(
        ".{}-",
        dest.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unpack".to_string())
    );
    let temp = tempfile::Builder::new()
        .prefix(&prefix)
        .tempdir_in(parent)
        .context("Failed to create temporary directory")?;

    let child = tokio::process::Command::new("tar")
        .arg("--strip-components=1")
        .arg("-C")
        .arg(temp.path())
        .arg("-xf")
        .arg(archive)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .context("Failed to run the 'tar' command")?;

    let output = tokio::select! {
        output = child.wait_with_output() => output.context("Failed to wait for 'tar'")?,
        () = cancel.cancelled() => return Err(Error::Cancelled.into()),
    };

    if !output.status.success() {
        bail!(
            "Failed to unpack .xz archive using the 'tar' command ({}):\n{}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    // The emptied TempDir is dropped afterwards; its cleanup is a no-op
    fs::rename(temp.path(), dest).with_context(|| {
        format!(
            "Failed to move unpacked archive to {}",
            dest.display()
        )
    })?;

    Ok(())
}

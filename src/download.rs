//! Archive downloads with progress tracking

use crate::error::Error;
use crate::extract::{self, ArchiveFormat};
use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// HTTP client for release archives
#[derive(Clone, Debug)]
pub struct Downloader {
    client: reqwest::Client,
    progress: bool,
    temp_dir: Option<PathBuf>,
}

impl Downloader {
    pub fn new() -> crate::error::Result<Self> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> crate::error::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("toolpin/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            progress: std::io::stderr().is_terminal(),
            temp_dir: None,
        })
    }

    /// Disable the progress bar even on a terminal
    pub fn quiet(mut self) -> Self {
        self.progress = false;
        self
    }

    /// Keep in-flight downloads in `dir` instead of the system temp directory
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Download `url` and unpack it into `dest`.
    ///
    /// The body is streamed into a temporary file that keeps the URL's
    /// extension; the file is removed afterwards whatever the outcome.
    pub async fn download_and_unpack(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let format = ArchiveFormat::from_url(url)?;

        let prefix = format!(
            "{}-",
            dest.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "download".to_string())
        );
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(format.extension());
        let temp = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .context("Failed to create temporary file")?;

        self.download_to(url, temp.path(), cancel).await?;

        extract::unpack(temp.path(), format, dest, cancel).await
    }

    async fn download_to(&self, url: &str, path: &Path, cancel: &CancellationToken) -> Result<()> {
        info!(%url, "Downloading");

        let mut response = tokio::select! {
            response = self.client.get(url).send() => {
                response.with_context(|| format!("Failed to fetch resource from '{}'", url))?
            }
            () = cancel.cancelled() => return Err(Error::Cancelled.into()),
        };

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            bail!(
                "Failed to fetch resource from '{}': {} {}",
                url,
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            );
        }

        let pb = self.progress_bar(url, response.content_length());

        let mut file = tokio::fs::File::create(path)
            .await
            .context("Failed to create output file")?;
        let mut downloaded: u64 = 0;

        loop {
            let chunk = tokio::select! {
                chunk = response.chunk() => chunk.context("Failed to download file")?,
                () = cancel.cancelled() => {
                    pb.abandon();
                    return Err(Error::Cancelled.into());
                }
            };
            let Some(chunk) = chunk else { break };

            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }

        file.flush().await?;
        pb.finish_and_clear();

        debug!(%url, bytes = downloaded, path = %path.display(), "Download complete");
        Ok(())
    }

    fn progress_bar(&self, url: &str, length: Option<u64>) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(length.unwrap_or(0));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        let name = url.rsplit('/').next().unwrap_or(url);
        pb.set_message(format!("⬇ {}", name));
        pb
    }
}

//! GitHub content retrieval: raw file blobs and repository licenses.
//!
//! Requests are anonymous unless a token is supplied through
//! [`Config::github_token`](crate::config::Config), which raises GitHub's
//! rate limits. The token is passed in explicitly; nothing here reads the
//! process environment.
//!
//! # Examples
//!
//! ```no_run
//! use toolpin::github::GitHubClient;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = GitHubClient::new(None)?;
//!     let license = client
//!         .download_license("https://github.com/orhun/git-cliff", "v2.2.1", &CancellationToken::new())
//!         .await?;
//!     println!("{}: {} bytes", license.name, license.content.len());
//!     Ok(())
//! }
//! ```

use crate::error::Error;
use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const GITHUB_HOST: &str = "github.com";
const GITHUB_API_BASE: &str = "https://api.github.com";
const GITHUB_RAW_BASE: &str = "https://raw.githubusercontent.com";
const FALLBACK_REF: &str = "master";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A repository license as returned by the GitHub API, with decoded content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct License {
    pub name: String,
    pub html_url: String,
    pub sha: String,
    pub content: Vec<u8>,
}

#[derive(Deserialize)]
struct LicenseResponse {
    name: String,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    sha: String,
    content: String,
}

#[derive(Clone, Debug)]
pub struct GitHubClient {
    client: reqwest::Client,
    token: Option<String>,
    api_base: String,
    raw_base: String,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> crate::error::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(format!("toolpin/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            token: token.filter(|t| !t.is_empty()),
            api_base: GITHUB_API_BASE.to_string(),
            raw_base: GITHUB_RAW_BASE.to_string(),
        })
    }

    /// Point the client at different API and raw-content hosts
    pub fn with_base_urls(mut self, api_base: &str, raw_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.raw_base = raw_base.trim_end_matches('/').to_string();
        self
    }

    /// Fetch a file given its human-facing `github.com/.../blob/...` URL
    pub async fn download_blob(&self, url: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let raw_url = raw_blob_url(url, &self.raw_base);
        debug!(%url, %raw_url, "Fetching blob from GitHub");

        let response = self.get(&raw_url, cancel).await?;
        let status = response.status();
        if !status.is_success() {
            bail!("Failed to fetch blob '{}' from GitHub: {}", raw_url, status);
        }

        let body = tokio::select! {
            body = response.bytes() => {
                body.with_context(|| format!("Failed to read body from GitHub response '{}'", raw_url))?
            }
            () = cancel.cancelled() => return Err(Error::Cancelled.into()),
        };
        Ok(body.to_vec())
    }

    /// Fetch the license of `repo_url` at `git_ref`.
    ///
    /// If the ref is unknown to GitHub the lookup is repeated once against
    /// `master`.
    pub async fn download_license(
        &self,
        repo_url: &str,
        git_ref: &str,
        cancel: &CancellationToken,
    ) -> Result<License> {
        let mut refs = vec![git_ref];
        if git_ref != FALLBACK_REF {
            refs.push(FALLBACK_REF);
        }

        for r in refs {
            let url = self.license_url(repo_url, r)?;
            debug!(%url, "Fetching license from GitHub");

            let response = self.get(url.as_str(), cancel).await?;
            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                warn!(repo = %repo_url, git_ref = %r, "No license found for ref");
                continue;
            }
            if status != reqwest::StatusCode::OK {
                bail!("Failed to fetch license from GitHub at '{}': {}", url, status);
            }

            let bytes = tokio::select! {
                body = response.bytes() => {
                    body.with_context(|| format!("Failed to read body from GitHub response '{}'", url))?
                }
                () = cancel.cancelled() => return Err(Error::Cancelled.into()),
            };
            let body: LicenseResponse = serde_json::from_slice(&bytes)
                .map_err(Error::Json)
                .with_context(|| format!("Failed to parse GitHub response JSON (url: '{}')", url))?;

            return decode_license(body)
                .with_context(|| format!("Failed to decode GitHub license content (url: '{}')", url));
        }

        bail!("No license found for {} at '{}' or '{}'", repo_url, git_ref, FALLBACK_REF)
    }

    fn license_url(&self, repo_url: &str, git_ref: &str) -> Result<Url> {
        let endpoint = format!("{}/repos/{}/license", self.api_base, repo_path(repo_url));
        Url::parse_with_params(&endpoint, &[("ref", git_ref)])
            .with_context(|| format!("Invalid GitHub API URL '{}'", endpoint))
    }

    async fn get(&self, url: &str, cancel: &CancellationToken) -> Result<reqwest::Response> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        tokio::select! {
            response = request.send() => {
                response.with_context(|| format!("Failed to fetch '{}' from GitHub", url))
            }
            () = cancel.cancelled() => Err(Error::Cancelled.into()),
        }
    }
}

/// Path segments of a `github.com` URL, or `None` for any other host
fn github_segments(url: &str) -> Option<Vec<String>> {
    let parsed = Url::parse(url).ok()?;
    if parsed.host_str() != Some(GITHUB_HOST) {
        return None;
    }
    let segments = parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    Some(segments)
}

/// `https://github.com/o/r` -> `o/r`; anything else is taken as `o/r` already
fn repo_path(repo_url: &str) -> String {
    match github_segments(repo_url) {
        Some(segments) => segments
            .iter()
            .take(2)
            .map(|s| s.trim_end_matches(".git"))
            .collect::<Vec<_>>()
            .join("/"),
        None => repo_url.trim_matches('/').to_string(),
    }
}

/// `https://github.com/o/r/blob/ref/path` -> `{raw_base}/o/r/ref/path`
fn raw_blob_url(url: &str, raw_base: &str) -> String {
    match github_segments(url) {
        Some(mut segments) => {
            if segments.get(2).map(String::as_str) == Some("blob") {
                segments.remove(2);
            }
            format!("{}/{}", raw_base, segments.join("/"))
        }
        None => url.to_string(),
    }
}

fn decode_license(body: LicenseResponse) -> Result<License> {
    // GitHub wraps base64 payloads at 60 columns
    let encoded: String = body.content.split_whitespace().collect();
    let content = STANDARD.decode(encoded.as_bytes())?;

    Ok(License {
        name: body.name,
        html_url: body.html_url,
        sha: body.sha,
        content,
    })
}

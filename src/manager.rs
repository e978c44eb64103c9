//! High-level ToolManager API: the fetch pipeline for one pinned tool.
//!
//! A [`ToolManager`] owns the configuration, the recipe catalog, one HTTP
//! client and the detected host platform. [`ToolManager::fetch`] makes the
//! pinned version of a tool available as `{bin_dir}/{name}`:
//!
//! 1. look the tool up in the recipe catalog
//! 2. read its pinned version from the version file
//! 3. stop early if the bin-dir link already points at that version
//! 4. install into the store unless the versioned entry already exists
//! 5. (re)publish the link
//! 6. run the recipe's smoke test
//!
//! # Quick Start
//!
//! ```no_run
//! use toolpin::{Config, ToolManager};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let manager = ToolManager::new(Config::default())?;
//!     let outcome = manager.fetch("git-cliff", &CancellationToken::new()).await?;
//!     println!("{} {} -> {}", outcome.name, outcome.version, outcome.path.display());
//!     Ok(())
//! }
//! ```
//!
//! Batch callers fetch one tool at a time; two concurrent fetches of the same
//! tool name race on its link.

use crate::config::Config;
use crate::download::Downloader;
use crate::error::{Error, Result};
use crate::github::{GitHubClient, License};
use crate::installer::{InstallContext, Installer};
use crate::platform::Platform;
use crate::recipe::{self, Registry};
use crate::store::Store;
use crate::tool::Tool;
use crate::{pinfile, symlink};
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Which path a fetch took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    /// The link already pointed at the pinned version; nothing was touched
    AlreadyLinked,
    /// The pinned version was installed into the store and linked
    Installed,
    /// The pinned version was already in the store and got relinked
    Relinked,
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchState::AlreadyLinked => f.write_str("already linked"),
            FetchState::Installed => f.write_str("installed"),
            FetchState::Relinked => f.write_str("relinked"),
        }
    }
}

/// Result of a fetch operation
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub name: String,
    pub version: String,
    /// The published link, `{bin_dir}/{name}`
    pub path: PathBuf,
    pub state: FetchState,
    /// Time taken (milliseconds)
    pub time_ms: u64,
}

pub struct ToolManager {
    config: Config,
    registry: Registry,
    downloader: Downloader,
    github: GitHubClient,
    platform: Platform,
}

impl ToolManager {
    /// Create a manager for `config`, loading its recipe catalog and
    /// detecting the host platform.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid settings or an unreadable
    /// catalog, and [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let registry = config.registry()?;
        let downloader = Downloader::with_timeout(config.http_timeout)?;
        let github = GitHubClient::new(config.github_token.clone())?;

        Ok(Self {
            config,
            registry,
            downloader,
            github,
            platform: Platform::current(),
        })
    }

    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Render download URLs for `platform` instead of the host
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_downloader(mut self, downloader: Downloader) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn with_github(mut self, github: GitHubClient) -> Self {
        self.github = github;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Make the pinned version of `name` available in the bin directory.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownTool`] if `name` has no recipe or no pin
    /// - [`Error::Parse`] if the version file is malformed
    /// - [`Error::Installation`] if installing into the store fails
    /// - [`Error::Verification`] if the smoke test fails
    /// - [`Error::Cancelled`] if `cancel` fires first
    pub async fn fetch(&self, name: &str, cancel: &CancellationToken) -> Result<FetchOutcome> {
        let start = Instant::now();

        let recipe = self.registry.lookup(name)?;
        let version = self.pinned_version(name)?;
        let tool = Tool::new(recipe, version);

        let bin_dir = &self.config.bin_dir;
        let store = Store::new(self.config.store_dir());
        let versioned_bin = tool.bin_path();

        if symlink::is_current(name, &versioned_bin, bin_dir, store.root())? {
            debug!(tool = %name, version = %tool.version(), "Already linked");
            return Ok(self.outcome(&tool, FetchState::AlreadyLinked, start));
        }

        let state = if store.contains(&tool.store_dir())? {
            debug!(tool = %name, entry = %tool.store_dir(), "Found in store");
            FetchState::Relinked
        } else {
            let ctx = InstallContext {
                downloader: &self.downloader,
                platform: &self.platform,
                store: &store,
                toolchain: &self.config.toolchain,
                cancel,
            };
            Installer::for_recipe(recipe).install(&ctx, &tool).await?;
            FetchState::Installed
        };

        symlink::publish(name, &versioned_bin, bin_dir, store.root())?;
        info!(tool = %name, version = %tool.version(), %state, "Linked");

        tool.run_smoke_test(bin_dir, cancel).await?;

        Ok(self.outcome(&tool, state, start))
    }

    /// Fetch the license of the pinned version of `name` from its GitHub
    /// repository
    pub async fn license(&self, name: &str, cancel: &CancellationToken) -> Result<License> {
        let recipe = self.registry.lookup(name)?;
        let repository = recipe.repository.as_deref().ok_or_else(|| {
            Error::Config(format!("recipe '{}' has no repository", recipe.name))
        })?;
        let tool = Tool::new(recipe, self.pinned_version(name)?);

        self.github
            .download_license(repository, &tool.tag(), cancel)
            .await
            .map_err(|e| e.downcast::<Error>().unwrap_or_else(Error::Other))
    }

    /// The version file is read on every call so edits take effect
    /// immediately
    fn pinned_version(&self, name: &str) -> Result<String> {
        let pins = pinfile::parse_file(&self.config.version_file)?;
        match pins.get(name) {
            Some(entry) => Ok(entry.version.clone()),
            None => Err(Error::UnknownTool {
                name: name.to_string(),
                suggestion: recipe::suggest(name, pins.keys().map(String::as_str)),
            }),
        }
    }

    fn outcome(&self, tool: &Tool<'_>, state: FetchState, start: Instant) -> FetchOutcome {
        FetchOutcome {
            name: tool.name().to_string(),
            version: tool.version().to_string(),
            path: self.config.bin_dir.join(tool.name()),
            state,
            time_ms: start.elapsed().as_millis() as u64,
        }
    }
}

//! Runtime configuration.
//!
//! The binary fills a [`Config`] from its command line (with environment
//! fallbacks handled by clap); library callers construct one directly,
//! usually starting from [`Config::default`].

use crate::error::{Error, Result};
use crate::recipe::Registry;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BIN_DIR: &str = ".bin";
pub const DEFAULT_VERSION_FILE: &str = "TOOL_VERSIONS";
pub const DEFAULT_TOOLCHAIN: &str = "go";
pub const STORE_DIR_NAME: &str = ".store";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding one symlink per tool
    pub bin_dir: PathBuf,
    /// Store root; `<bin_dir>/.store` when unset
    pub store_dir: Option<PathBuf>,
    /// Version-pin file, re-read on every fetch
    pub version_file: PathBuf,
    /// TOML recipe catalog replacing the built-in one
    pub recipes: Option<PathBuf>,
    /// Bearer token for GitHub requests
    pub github_token: Option<String>,
    /// Program run for toolchain installs
    pub toolchain: String,
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bin_dir: PathBuf::from(DEFAULT_BIN_DIR),
            store_dir: None,
            version_file: PathBuf::from(DEFAULT_VERSION_FILE),
            recipes: None,
            github_token: None,
            toolchain: DEFAULT_TOOLCHAIN.to_string(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl Config {
    /// Resolved store root
    pub fn store_dir(&self) -> PathBuf {
        self.store_dir
            .clone()
            .unwrap_or_else(|| self.bin_dir.join(STORE_DIR_NAME))
    }

    /// The recipe catalog this configuration selects
    pub fn registry(&self) -> Result<Registry> {
        match &self.recipes {
            Some(path) => Registry::from_toml_file(path),
            None => Ok(Registry::builtin()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.bin_dir.as_os_str().is_empty() {
            return Err(Error::Config("bin directory must not be empty".to_string()));
        }
        if self.version_file.as_os_str().is_empty() {
            return Err(Error::Config("version file must not be empty".to_string()));
        }
        if self.toolchain.trim().is_empty() {
            return Err(Error::Config("toolchain program must not be empty".to_string()));
        }
        if self.http_timeout.is_zero() {
            return Err(Error::Config("HTTP timeout must be positive".to_string()));
        }
        Ok(())
    }
}

//! Host platform naming for URL templates.
//!
//! Release assets are usually published under the names the Go toolchain uses
//! for operating systems and architectures (`darwin`, `linux`, `amd64`,
//! `arm64`). Recipes key their remapping tables on these names, so the host is
//! always described in that vocabulary rather than in Rust's
//! (`macos`, `x86_64`, `aarch64`).
//!
//! # Examples
//!
//! ```
//! use toolpin::platform::Platform;
//!
//! let platform = Platform::new("darwin", "arm64");
//! assert_eq!(platform.to_string(), "darwin/arm64");
//! ```

use std::fmt;

/// Operating system and architecture names substituted into URL templates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Detect the platform this binary is running on
    pub fn current() -> Self {
        Self::new(
            os_name(std::env::consts::OS),
            arch_name(std::env::consts::ARCH),
        )
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

fn os_name(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

fn arch_name(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "powerpc64" => "ppc64",
        other => other,
    }
}

//! Recipes describe how to obtain and verify one named tool.
//!
//! A [`Registry`] is an immutable catalog handed to the
//! [`ToolManager`](crate::manager::ToolManager) at construction time. It can be
//! the built-in catalog or one loaded from a TOML file:
//!
//! ```toml
//! [[recipe]]
//! name = "git-cliff"
//! test = ["--version"]
//!
//! [recipe.source]
//! kind = "archive"
//! url_template = "https://github.com/orhun/git-cliff/releases/download/v{{ .Version }}/git-cliff-{{ .Version }}-{{ .Arch }}-{{ .OS }}.tar.gz"
//!
//! [recipe.os]
//! darwin = "apple-darwin"
//! linux = "unknown-linux-gnu"
//!
//! [recipe.arch]
//! arm64 = "aarch64"
//! amd64 = "x86_64"
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// How a tool gets into the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Built by the language toolchain's own install command
    Toolchain,
    /// Prebuilt binary archive downloaded over HTTP
    Archive,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Toolchain => f.write_str("toolchain"),
            SourceKind::Archive => f.write_str("archive"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub kind: SourceKind,
    /// Module path for toolchain installs, URL template for archives
    pub url_template: String,
    /// Binary location relative to the versioned store entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    pub source: Source,
    /// Arguments for the post-install smoke test; empty skips it
    #[serde(default)]
    pub test: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<HashMap<String, String>>,
    /// GitHub repository URL, used to look up the tool's license
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

impl Recipe {
    pub fn toolchain(name: &str, module: &str) -> Self {
        Self::with_source(name, SourceKind::Toolchain, module)
    }

    pub fn archive(name: &str, url_template: &str) -> Self {
        Self::with_source(name, SourceKind::Archive, url_template)
    }

    fn with_source(name: &str, kind: SourceKind, url_template: &str) -> Self {
        Self {
            name: name.to_string(),
            source: Source {
                kind,
                url_template: url_template.to_string(),
                bin_path: None,
            },
            test: Vec::new(),
            os: None,
            arch: None,
            repository: None,
        }
    }

    pub fn with_test<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.test = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_bin_path(mut self, bin_path: &str) -> Self {
        self.source.bin_path = Some(bin_path.to_string());
        self
    }

    pub fn with_repository(mut self, url: &str) -> Self {
        self.repository = Some(url.to_string());
        self
    }

    pub fn with_os_map(mut self, pairs: &[(&str, &str)]) -> Self {
        self.os = Some(to_map(pairs));
        self
    }

    pub fn with_arch_map(mut self, pairs: &[(&str, &str)]) -> Self {
        self.arch = Some(to_map(pairs));
        self
    }

    /// OS name after applying the recipe's remapping table
    pub fn map_os<'a>(&'a self, os: &'a str) -> &'a str {
        remap(self.os.as_ref(), os)
    }

    /// Architecture name after applying the recipe's remapping table
    pub fn map_arch<'a>(&'a self, arch: &'a str) -> &'a str {
        remap(self.arch.as_ref(), arch)
    }
}

fn to_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn remap<'a>(table: Option<&'a HashMap<String, String>>, key: &'a str) -> &'a str {
    table
        .and_then(|t| t.get(key))
        .map(String::as_str)
        .unwrap_or(key)
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "recipe")]
    recipes: Vec<Recipe>,
}

/// Immutable catalog of recipes keyed by tool name
#[derive(Debug, Clone, Default)]
pub struct Registry {
    recipes: Vec<Recipe>,
}

impl Registry {
    /// Build a registry, rejecting duplicate names
    pub fn new(recipes: Vec<Recipe>) -> Result<Self> {
        for (i, recipe) in recipes.iter().enumerate() {
            if recipe.name.is_empty() {
                return Err(Error::Config("recipe with empty name".to_string()));
            }
            if recipes[..i].iter().any(|r| r.name == recipe.name) {
                return Err(Error::Config(format!(
                    "duplicate recipe '{}'",
                    recipe.name
                )));
            }
        }
        Ok(Self { recipes })
    }

    /// Parse a TOML catalog with one `[[recipe]]` table per tool
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(contents)
            .map_err(|e| Error::Config(format!("invalid recipe catalog: {e}")))?;
        Self::new(file.recipes)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "cannot read recipe catalog '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&contents)
    }

    /// The catalog shipped with the binary
    pub fn builtin() -> Self {
        Self {
            recipes: vec![
                Recipe::toolchain("staticcheck", "honnef.co/go/tools/cmd/staticcheck")
                    .with_repository("https://github.com/dominikh/go-tools")
                    .with_test(["--version"]),
                Recipe::toolchain(
                    "golangci-lint",
                    "github.com/golangci/golangci-lint/cmd/golangci-lint",
                )
                .with_repository("https://github.com/golangci/golangci-lint")
                .with_test(["--version"]),
                Recipe::toolchain("gotestsum", "gotest.tools/gotestsum")
                    .with_repository("https://github.com/gotestyourself/gotestsum")
                    .with_test(["--version"]),
                Recipe::archive(
                    "git-cliff",
                    "https://github.com/orhun/git-cliff/releases/download/v{{ .Version }}/git-cliff-{{ .Version }}-{{ .Arch }}-{{ .OS }}.tar.gz",
                )
                .with_os_map(&[("darwin", "apple-darwin"), ("linux", "unknown-linux-gnu")])
                .with_arch_map(&[("arm64", "aarch64"), ("amd64", "x86_64")])
                .with_repository("https://github.com/orhun/git-cliff")
                .with_test(["--version"]),
            ],
        }
    }

    pub fn get(&self, name: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.name == name)
    }

    /// Look up a recipe, failing with a suggestion for near misses
    pub fn lookup(&self, name: &str) -> Result<&Recipe> {
        self.get(name).ok_or_else(|| Error::UnknownTool {
            name: name.to_string(),
            suggestion: suggest(name, self.names()),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.recipes.iter().map(|r| r.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

/// Closest candidate by Jaro-Winkler similarity, if any is close enough
pub(crate) fn suggest<'a>(name: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
    candidates
        .map(|c| (c, strsim::jaro_winkler(name, c)))
        .filter(|(_, score)| *score > 0.85)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| c.to_string())
}

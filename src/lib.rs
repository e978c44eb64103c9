//! Library interface for toolpin
//!
//! Pins command-line tools to versions in a plain-text version file, installs
//! each pinned version once into a version-addressed store and exposes it
//! through a stable symlink in a bin directory.
//!
//! [`ToolManager`] is the entry point; the remaining modules are the pieces
//! of its pipeline and are public for callers that need only one of them.

pub mod config;
pub mod download;
pub mod error;
pub mod extract;
pub mod github;
pub mod installer;
pub mod manager;
pub mod pinfile;
pub mod platform;
pub mod recipe;
pub mod store;
pub mod symlink;
pub mod template;
pub mod tool;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, ParseErrorKind, Result};
pub use manager::{FetchOutcome, FetchState, ToolManager};
pub use pinfile::{PinEntry, PinFile};
pub use platform::Platform;
pub use recipe::{Recipe, Registry, SourceKind};

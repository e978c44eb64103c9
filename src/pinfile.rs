//! Version-pin file parsing.
//!
//! The pin file is line oriented. Every meaningful line names a tool, an
//! arbitrary source descriptor and the exact version to install:
//!
//! ```text
//! # Go dev tools
//! staticcheck: go://honnef.co/go/tools/cmd/staticcheck@2024.1.1
//!
//! git-cliff: bin://orhun/git-cliff@2.2.1
//! ```
//!
//! Blank lines and lines whose first non-whitespace character is `#` are
//! ignored. The source descriptor is informational only; resolution goes
//! through the recipe registry.
//!
//! # Examples
//!
//! ```
//! use toolpin::pinfile;
//!
//! let pins = pinfile::parse_str("jq: bin://jqlang/jq@1.7.1\n").unwrap();
//! assert_eq!(pins["jq"].version, "1.7.1");
//! ```

use crate::error::{Error, ParseErrorKind, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A single pinned tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinEntry {
    pub name: String,
    pub version: String,
}

/// Parsed pin file, keyed by tool name
pub type PinFile = HashMap<String, PinEntry>;

/// Parse a pin file from any buffered reader.
///
/// Stops at the first malformed line. When a name appears more than once the
/// last line wins.
pub fn parse<R: BufRead>(reader: R) -> Result<PinFile> {
    let mut entries = PinFile::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let entry = parse_line(line, index + 1)?;
        entries.insert(entry.name.clone(), entry);
    }

    Ok(entries)
}

/// Parse pin file contents held in memory
pub fn parse_str(contents: &str) -> Result<PinFile> {
    parse(contents.as_bytes())
}

/// Open and parse the pin file at `path`
pub fn parse_file(path: &Path) -> Result<PinFile> {
    let file = File::open(path).map_err(|e| {
        Error::Config(format!(
            "cannot open version file '{}': {}",
            path.display(),
            e
        ))
    })?;
    parse(BufReader::new(file))
}

fn parse_line(line: &str, line_num: usize) -> Result<PinEntry> {
    let Some(colon) = line.find(':') else {
        return Err(Error::parse(line_num, ParseErrorKind::MissingName, None));
    };

    let after_colon = &line[colon + 1..];
    if after_colon.is_empty() {
        return Err(Error::parse(
            line_num,
            ParseErrorKind::MissingVersion,
            Some("expected source and version number, got end of line".to_string()),
        ));
    }

    // `://...` with nothing before it is a source URL, not a name
    if after_colon.starts_with('/') {
        return Err(Error::parse(line_num, ParseErrorKind::MissingName, None));
    }

    let name = line[..colon].trim();
    if name.is_empty() {
        return Err(Error::parse(line_num, ParseErrorKind::MissingName, None));
    }

    let Some(at) = line.find('@') else {
        return Err(Error::parse(
            line_num,
            ParseErrorKind::MissingVersion,
            Some(format!("no version marker '@' found for tool {name}")),
        ));
    };

    let version = line[at + 1..].trim();
    if version.is_empty() {
        return Err(Error::parse(
            line_num,
            ParseErrorKind::MissingVersion,
            Some(format!("expected version number for tool {name}, got end of line")),
        ));
    }

    Ok(PinEntry {
        name: name.to_string(),
        version: version.to_string(),
    })
}

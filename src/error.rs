use std::fmt;
use thiserror::Error;

/// Why a line of the version-pin file was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    MissingName,
    MissingVersion,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::MissingName => f.write_str("missing tool name"),
            ParseErrorKind::MissingVersion => f.write_str("missing tool version"),
        }
    }
}

fn suffix(before: &str, value: &Option<String>, after: &str) -> String {
    value
        .as_deref()
        .map(|v| format!("{before}{v}{after}"))
        .unwrap_or_default()
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{kind} on line {line}{}", suffix(": ", .detail, ""))]
    Parse {
        line: usize,
        kind: ParseErrorKind,
        detail: Option<String>,
    },

    #[error("unknown tool '{name}'{}", suffix(" (did you mean '", .suggestion, "'?)"))]
    UnknownTool {
        name: String,
        suggestion: Option<String>,
    },

    #[error("installation failed: {tool}: {source:#}")]
    Installation {
        tool: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("smoke test failed: {command} exited with {status}")]
    Verification {
        tool: String,
        command: String,
        status: String,
    },

    #[error("unknown archive format '{0}'")]
    UnknownFormat(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub(crate) fn parse(line: usize, kind: ParseErrorKind, detail: Option<String>) -> Self {
        Error::Parse { line, kind, detail }
    }

    /// Wrap a lower-level failure as an installation failure for `tool`.
    ///
    /// Cancellation is kept distinct so callers can tell an interrupted
    /// install from a broken one.
    pub(crate) fn installation(tool: impl Into<String>, source: anyhow::Error) -> Self {
        if source.downcast_ref::<Error>().is_some_and(Error::is_cancelled) {
            return Error::Cancelled;
        }
        Error::Installation {
            tool: tool.into(),
            source,
        }
    }

    /// True for any failure raised while installing a tool into the store
    pub fn is_installation(&self) -> bool {
        matches!(self, Error::Installation { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// The parse failure reason, if this is a pin-file error
    pub fn parse_kind(&self) -> Option<ParseErrorKind> {
        match self {
            Error::Parse { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

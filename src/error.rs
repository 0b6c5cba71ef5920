//! Error types for distribution acquisition.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], for callers that only need to
/// decide how to react (retry later, report a corrupt download, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Filesystem,
    NotFound,
    Parse,
    ChecksumMismatch,
    Transport,
}

/// Errors that can occur while acquiring a runtime distribution.
#[derive(Error, Debug)]
pub enum Error {
    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", not_found_message(name, root, *found))]
    NotFound {
        name: String,
        root: PathBuf,
        found: usize,
    },

    #[error("cannot parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error(
        "checksum mismatch for {path}\n  expected: {}\n  got:      {}",
        expected.as_deref().unwrap_or("<not listed>"),
        actual.as_deref().unwrap_or("<not computed>")
    )]
    ChecksumMismatch {
        path: String,
        expected: Option<String>,
        actual: Option<String>,
    },

    #[error("download failed for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("invalid runtime version '{version}': {source}")]
    InvalidVersion {
        version: String,
        #[source]
        source: semver::Error,
    },

    #[error("cannot lock {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn not_found_message(name: &str, root: &std::path::Path, found: usize) -> String {
    if found == 0 {
        format!("couldn't find {} under {}", name, root.display())
    } else {
        format!(
            "expected exactly one {} under {}, found {}",
            name,
            root.display(),
            found
        )
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Filesystem { .. } | Self::Lock { .. } => ErrorKind::Filesystem,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Parse { .. } | Self::InvalidVersion { .. } => ErrorKind::Parse,
            Self::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            Self::Transport { .. } => ErrorKind::Transport,
        }
    }

    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn transport(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::Transport {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_messages() {
        let missing = Error::NotFound {
            name: "node_version.h".into(),
            root: PathBuf::from("/cache/include"),
            found: 0,
        };
        assert!(missing.to_string().contains("couldn't find node_version.h"));

        let ambiguous = Error::NotFound {
            name: "node_version.h".into(),
            root: PathBuf::from("/cache/include"),
            found: 2,
        };
        assert!(ambiguous.to_string().contains("found 2"));
        assert_eq!(ambiguous.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_checksum_message_shows_both_sides() {
        let err = Error::ChecksumMismatch {
            path: "node-v18.0.0-headers.tar.gz".into(),
            expected: Some("deadbeef".into()),
            actual: Some("cafebabe".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("deadbeef"));
        assert!(msg.contains("cafebabe"));
        assert_eq!(err.kind(), ErrorKind::ChecksumMismatch);
    }

    #[test]
    fn test_unlisted_checksum_message() {
        let err = Error::ChecksumMismatch {
            path: "win-x64/node.lib".into(),
            expected: None,
            actual: Some("cafebabe".into()),
        };
        assert!(err.to_string().contains("<not listed>"));
    }
}

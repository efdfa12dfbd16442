//! Error type shared by the index library.
//!
//! Absent entries, empty result sets and "no ancestor found" are not errors;
//! they are returned as `Option`s and empty collections.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors raised by the path codec, the address parser and the stores
#[derive(Debug, Error)]
pub enum IndexError {
    /// The path cannot be encoded without colliding with the escape sequence
    #[error("invalid path for index directory: {path}")]
    InvalidPath { path: String },

    /// `host:port` with an empty, non-numeric or zero port
    #[error("invalid address: {address}")]
    InvalidAddress { address: String },

    /// A persisted store operation failed at the I/O level
    #[error("store I/O error on {}: {source}", path.display())]
    StoreIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A table file could not be decoded
    #[error("corrupt table {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// The on-disk index was written by a different format version
    #[error("index at {} has version {found}, expected {expected}; rebuild required", path.display())]
    VersionMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    /// `meta.json` could not be read or written
    #[error("index metadata error in {}: {source}", path.display())]
    Meta {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl IndexError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        IndexError::StoreIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        IndexError::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = IndexError::InvalidPath {
            path: "/a/<underscore>".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid path for index directory: /a/<underscore>"
        );

        let err = IndexError::VersionMismatch {
            path: PathBuf::from("/idx"),
            found: 3,
            expected: 1025,
        };
        assert!(err.to_string().contains("version 3, expected 1025"));
    }

    #[test]
    fn test_io_error_keeps_source() {
        let err = IndexError::io("/idx/symbols.db", io::Error::other("disk full"));
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "disk full");
    }
}

//! Error types for the uasset library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for asset operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Companion file (payload or overflow) does not exist
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Invalid magic bytes at start of the container
    #[error("Invalid asset file: bad package tag")]
    InvalidMagic,

    /// Unsupported or unrecognized engine version string
    #[error("Unsupported engine version: {0}")]
    UnsupportedVersion(String),

    /// Structural mismatch while decoding: an actual value differed from
    /// the expected one at the given byte offset
    #[error("Parse failed at offset {offset}: {message}")]
    Parse { offset: u64, message: String },

    /// Recognized but unimplemented format flag
    #[error("Unsupported format: {0}")]
    Unsupported(String),

    /// Domain constraint violated before writing any bytes
    #[error("Invalid operation: {0}")]
    Constraint(String),

    /// Name table index out of bounds
    #[error("Name id {index} out of bounds (count: {count})")]
    NameOutOfBounds { index: usize, count: usize },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a parse error at the given stream offset.
    pub fn parse(offset: u64, msg: impl Into<String>) -> Self {
        Self::Parse { offset, message: msg.into() }
    }

    /// Create an unsupported-variant error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create a domain-constraint error.
    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::Constraint(msg.into())
    }

    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Result type alias for asset operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::parse(193, "name table truncated");
        assert!(e.to_string().contains("193"));
        assert!(e.to_string().contains("name table"));

        let e = Error::NameOutOfBounds { index: 5, count: 3 };
        assert!(e.to_string().contains("5"));
        assert!(e.to_string().contains("3"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}

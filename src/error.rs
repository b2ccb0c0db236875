//! Error types and handling infrastructure for bklog.
//!
//! This module provides a centralized error handling system using `thiserror`.
//! Malformed log lines are never errors: the tokenizer degrades them to untimed
//! content. Everything that would silently corrupt a result (bad schema, out of
//! range seek, unreadable storage, bad pattern) surfaces here and aborts only the
//! operation that hit it.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for bklog operations.
#[derive(Error, Debug)]
pub enum BklogError {
    /// File system related errors (open, read, write, persist)
    #[error("File operation failed: {message}")]
    FileError {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// File not found specifically (common case for user feedback)
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Path exists but is not a regular file
    #[error("Path is not a regular file: {path}")]
    NotAFile { path: PathBuf },

    /// Record store bytes that cannot be decoded
    #[error("Corrupt record store: {message}")]
    CorruptStore { message: String },

    /// Required column missing or column of the wrong type
    #[error("Schema error: {message}")]
    SchemaError { message: String },

    /// Seek or search start beyond the last row
    #[error("Row {row} is beyond file bounds (total rows: {total_rows})")]
    RowOutOfRange { row: u64, total_rows: u64 },

    /// Search pattern failed to compile
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Raw input line longer than the configured limit
    #[error("Line {line} exceeds the maximum line length of {limit} bytes")]
    LineTooLong { line: u64, limit: usize },

    /// Compression format detection or decompression errors
    #[error("Compression error: {message}")]
    CompressionError { message: String },

    /// Configuration related errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Generic error for cases not covered by specific variants
    #[error("Operation failed: {message}")]
    Other { message: String },
}

/// Standard Result type for bklog operations.
pub type Result<T> = std::result::Result<T, BklogError>;

impl BklogError {
    /// Create a FileError from an io::Error with additional context
    pub fn file_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileError {
            message: message.into(),
            source,
        }
    }

    /// Create a CorruptStore error with a descriptive message
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptStore {
            message: message.into(),
        }
    }

    /// Create a SchemaError with a descriptive message
    pub fn schema(message: impl Into<String>) -> Self {
        Self::SchemaError {
            message: message.into(),
        }
    }

    pub fn invalid_pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Create a CompressionError with a descriptive message
    pub fn compression(message: impl Into<String>) -> Self {
        Self::CompressionError {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a generic Other error with a descriptive message
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// True for errors caused by the caller's query rather than the data
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            Self::RowOutOfRange { .. } | Self::InvalidPattern { .. }
        )
    }
}

// Automatic conversion from io::Error to BklogError
impl From<std::io::Error> for BklogError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileError {
                message: "File not found".to_string(),
                source: err,
            },
            std::io::ErrorKind::PermissionDenied => Self::FileError {
                message: "Permission denied".to_string(),
                source: err,
            },
            std::io::ErrorKind::UnexpectedEof => Self::FileError {
                message: "Unexpected end of file".to_string(),
                source: err,
            },
            _ => Self::FileError {
                message: "IO operation failed".to_string(),
                source: err,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_error_display_messages() {
        let path = PathBuf::from("/test/build.bklc");

        let file_not_found = BklogError::FileNotFound { path: path.clone() };
        assert_eq!(file_not_found.to_string(), "File not found: /test/build.bklc");

        let not_a_file = BklogError::NotAFile { path };
        assert_eq!(
            not_a_file.to_string(),
            "Path is not a regular file: /test/build.bklc"
        );

        let bounds = BklogError::RowOutOfRange {
            row: 10,
            total_rows: 4,
        };
        assert_eq!(
            bounds.to_string(),
            "Row 10 is beyond file bounds (total rows: 4)"
        );

        let schema = BklogError::schema("required column 'content' not found");
        assert_eq!(
            schema.to_string(),
            "Schema error: required column 'content' not found"
        );
    }

    #[test]
    fn test_error_constructors() {
        let pattern_err = BklogError::invalid_pattern("(", "unclosed group");
        assert!(matches!(pattern_err, BklogError::InvalidPattern { .. }));
        assert!(pattern_err.is_query_error());

        let corrupt = BklogError::corrupt("bad magic");
        assert!(matches!(corrupt, BklogError::CorruptStore { .. }));
        assert!(!corrupt.is_query_error());

        let other_err = BklogError::other("Unknown error");
        assert!(matches!(other_err, BklogError::Other { .. }));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: BklogError = io_err.into();

        match err {
            BklogError::FileError { message, .. } => {
                assert_eq!(message, "File not found");
            }
            _ => panic!("Expected FileError variant"),
        }
    }
}

//! Path checks shared by raw log ingestion and store readers.
//!
//! Emptiness is left to the caller: an empty raw log is a valid input with
//! zero records, while an empty store file is corrupt.

use crate::error::{BklogError, Result};
use std::fs::File;
use std::path::Path;

/// Larger files are rejected before any decoding starts
const MAX_REASONABLE_SIZE: u64 = 100 * 1024 * 1024 * 1024; // 100GB

/// Validate that `path` is a readable regular file and return its size
///
/// # Error Cases
/// - Path does not exist ([`BklogError::FileNotFound`])
/// - Path is a directory or another non-regular file ([`BklogError::NotAFile`])
/// - File is suspiciously large (>100GB)
/// - File cannot be opened due to permissions
pub fn validate_file_path(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Err(BklogError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let metadata = std::fs::metadata(path)
        .map_err(|e| BklogError::file_error("Failed to read file metadata", e))?;

    if !metadata.is_file() {
        return Err(BklogError::NotAFile {
            path: path.to_path_buf(),
        });
    }

    let file_size = metadata.len();
    if file_size > MAX_REASONABLE_SIZE {
        return Err(BklogError::file_error(
            format!(
                "File is suspiciously large ({}GB): {}",
                file_size / (1024 * 1024 * 1024),
                path.display()
            ),
            std::io::Error::new(std::io::ErrorKind::InvalidData, "File too large"),
        ));
    }

    File::open(path).map_err(|e| BklogError::file_error("Cannot open file for reading", e))?;

    Ok(file_size)
}

//! Compression detection and transparent decompression for raw log input.
//!
//! Build logs are often archived compressed. The format is detected from the
//! file's magic numbers first and its extension second, and the ingest
//! pipeline reads through the matching `async-compression` decoder.

use crate::error::{BklogError, Result};
use async_compression::tokio::bufread::{BzDecoder, GzipDecoder, XzDecoder, ZstdDecoder};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncReadExt, BufReader};

/// Supported compression formats for raw logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    /// Plain text
    None,
    /// Gzip compression (.gz files)
    Gzip,
    /// Bzip2 compression (.bz2 files)
    Bzip2,
    /// XZ compression (.xz files)
    Xz,
    /// Zstandard compression (.zst, .zstd files)
    Zstd,
}

impl CompressionType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        }
    }

    pub fn is_compressed(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Line-oriented reader over a possibly compressed file
pub type LogSource = Box<dyn AsyncBufRead + Unpin + Send>;

/// Detect compression type from magic numbers, falling back to the extension
///
/// # Magic Numbers Used
/// - Gzip: `1f 8b` (RFC 1952)
/// - Bzip2: `42 5a 68` ("BZh" with block size)
/// - XZ: `fd 37 7a 58 5a 00`
/// - Zstd: `28 b5 2f fd`
pub async fn detect_compression(path: &Path) -> Result<CompressionType> {
    let mut file = File::open(path)
        .await
        .map_err(|e| BklogError::file_error(format!("Failed to open {}", path.display()), e))?;
    let mut buffer = [0u8; 8];
    let mut filled = 0;
    // Short reads are legal; keep reading until the magic window is full or EOF
    while filled < buffer.len() {
        let read = file
            .read(&mut buffer[filled..])
            .await
            .map_err(|e| BklogError::file_error("Failed to read file header", e))?;
        if read == 0 {
            break;
        }
        filled += read;
    }

    Ok(detect_by_magic(&buffer[..filled])
        .or_else(|| detect_by_extension(path))
        .unwrap_or(CompressionType::None))
}

fn detect_by_magic(magic: &[u8]) -> Option<CompressionType> {
    if magic.starts_with(&[0x1f, 0x8b]) {
        Some(CompressionType::Gzip)
    } else if magic.starts_with(&[0x42, 0x5a, 0x68]) {
        Some(CompressionType::Bzip2)
    } else if magic.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
        Some(CompressionType::Zstd)
    } else if magic.starts_with(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]) {
        Some(CompressionType::Xz)
    } else {
        None
    }
}

fn detect_by_extension(path: &Path) -> Option<CompressionType> {
    let ext = path.extension()?.to_str()?;
    match ext.to_lowercase().as_str() {
        "gz" => Some(CompressionType::Gzip),
        "bz2" => Some(CompressionType::Bzip2),
        "xz" => Some(CompressionType::Xz),
        "zst" | "zstd" => Some(CompressionType::Zstd),
        _ => None,
    }
}

/// Open `path` as a buffered line source, decompressing on the fly
pub async fn open_log_source(path: &Path, compression: CompressionType) -> Result<LogSource> {
    let file = File::open(path)
        .await
        .map_err(|e| BklogError::file_error(format!("Failed to open {}", path.display()), e))?;
    let file = BufReader::new(file);

    let source: LogSource = match compression {
        CompressionType::None => Box::new(file),
        CompressionType::Gzip => Box::new(BufReader::new(GzipDecoder::new(file))),
        CompressionType::Bzip2 => Box::new(BufReader::new(BzDecoder::new(file))),
        CompressionType::Xz => Box::new(BufReader::new(XzDecoder::new(file))),
        CompressionType::Zstd => Box::new(BufReader::new(ZstdDecoder::new(file))),
    };
    Ok(source)
}
